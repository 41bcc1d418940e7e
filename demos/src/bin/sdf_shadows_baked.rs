//! Distance field soft shadows from precomputed blobs (see `bake_sdf`).
//! Run: cargo run -p demos --bin sdf_shadows_baked -- --fields fields

use std::path::PathBuf;

use clap::Parser;
use demos::ShellArgs;
use umbra_bridge::FieldSource;

#[derive(Parser)]
#[command(about = "Sphere-traced soft shadows through distance fields loaded from disk")]
struct Cli {
    /// Directory with model.usdf, pillar.usdf and sphere.usdf
    #[arg(long, default_value = "fields")]
    fields: PathBuf,
    #[command(flatten)]
    shell: ShellArgs,
}

fn main() {
    demos::init_logging();
    let cli = Cli::parse();
    demos::run_or_exit("Umbra: SDF shadows (baked)", &cli.shell, FieldSource::Precomputed(cli.fields));
}
