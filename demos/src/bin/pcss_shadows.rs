//! Shadow map demo: PCSS blocker search and variable-size PCF.
//! Run: cargo run -p demos --bin pcss_shadows -- --scene pillar

use clap::Parser;
use demos::ShellArgs;
use umbra_bridge::FieldSource;

#[derive(Parser)]
#[command(about = "Percentage-closer soft shadows from a light depth map")]
struct Cli {
    #[command(flatten)]
    shell: ShellArgs,
}

fn main() {
    demos::init_logging();
    let cli = Cli::parse();
    demos::run_or_exit("Umbra: PCSS shadows", &cli.shell, FieldSource::None);
}
