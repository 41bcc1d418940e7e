//! Distance field soft shadows with the fields baked on the GPU at startup.
//! Run: cargo run -p demos --bin sdf_shadows -- --mesh-dir mesh

use clap::Parser;
use demos::ShellArgs;
use umbra_bridge::FieldSource;

#[derive(Parser)]
#[command(about = "Sphere-traced soft shadows through GPU-baked distance fields")]
struct Cli {
    #[command(flatten)]
    shell: ShellArgs,
}

fn main() {
    demos::init_logging();
    let cli = Cli::parse();
    demos::run_or_exit("Umbra: SDF shadows", &cli.shell, FieldSource::GpuBake);
}
