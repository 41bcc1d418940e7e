//! Offline distance field baker. Writes a `.usdf` blob for `sdf_shadows_baked`.
//! Run: cargo run --release -p demos --bin bake_sdf -- --preset pillar --mesh-dir mesh

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use glam::Vec3;
use render_api::RenderError;
use umbra_bridge::{headless_renderer, SceneKind, SceneMeshes};
use umbra_field::{bake, save_field, save_legacy_field, DistanceField, Mesh, DEFAULT_PADDING};
use umbra_renderer::UmbraConfig;

/// Bake a signed distance field from a closed triangle mesh.
#[derive(Parser)]
struct Cli {
    /// OBJ mesh to bake; the procedural sphere of radius 5 when omitted
    #[arg(conflicts_with = "preset")]
    input: Option<PathBuf>,
    /// Output blob [default: fields/<preset, input stem or "sphere">.usdf]
    output: Option<PathBuf>,
    /// Bake a demo scene caster (model, pillar, sphere) exactly as the demos pose it
    #[arg(long, value_parser = demos::parse_scene)]
    preset: Option<SceneKind>,
    /// Asset directory for --preset; procedural stand-ins when omitted
    #[arg(long)]
    mesh_dir: Option<PathBuf>,
    /// Voxel size in world units
    #[arg(long, default_value_t = 0.1)]
    spacing: f32,
    /// Empty voxels around the mesh bounds
    #[arg(long, default_value_t = DEFAULT_PADDING)]
    padding: u32,
    /// Coarsen the spacing so the longest axis has at most this many voxels
    #[arg(long, default_value_t = 128)]
    max_resolution: u32,
    /// Bake with the compute shader instead of the CPU
    #[arg(long)]
    gpu: bool,
    /// Write the headerless version 0 layout
    #[arg(long)]
    legacy: bool,
}

fn main() {
    demos::init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), RenderError> {
    let (mesh, name) = load_mesh(cli)?;
    let config = UmbraConfig {
        sdf_spacing: cli.spacing,
        sdf_padding: cli.padding,
        sdf_max_resolution: cli.max_resolution,
        ..UmbraConfig::default()
    };
    let spacing = config.spacing_for(mesh.max_extents() - mesh.min_extents());
    if spacing != cli.spacing {
        log::warn!("spacing {} coarsened to {} to stay within {} voxels per axis", cli.spacing, spacing, cli.max_resolution);
    }

    let start = Instant::now();
    let field = if cli.gpu { bake_on_gpu(&mesh, &name, config)? } else { bake(&mesh, spacing, cli.padding)? };
    let (lo, hi) = field.value_range();
    log::info!(
        "{}: {} grid, distances {:.3} .. {:.3}, {:.2?}",
        name,
        field.dimensions(),
        lo,
        hi,
        start.elapsed()
    );

    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from("fields").join(format!("{}.usdf", name)));
    if cli.legacy {
        save_legacy_field(&output, &field)
    } else {
        save_field(&output, &field)
    }
}

fn load_mesh(cli: &Cli) -> Result<(Mesh, String), RenderError> {
    if let Some(kind) = cli.preset {
        let meshes = SceneMeshes::load(cli.mesh_dir.as_deref())?;
        return Ok((meshes.caster(kind).clone(), kind.name().to_string()));
    }
    match &cli.input {
        Some(path) => {
            let name = path.file_stem().map_or_else(|| "mesh".to_string(), |s| s.to_string_lossy().into_owned());
            Ok((Mesh::load_obj(path)?, name))
        }
        None => Ok((Mesh::uv_sphere(Vec3::ZERO, 5.0, 64, 32)?, "sphere".to_string())),
    }
}

fn bake_on_gpu(mesh: &Mesh, label: &str, config: UmbraConfig) -> Result<DistanceField, RenderError> {
    let mut renderer = headless_renderer(config)?;
    let volume = renderer.bake_volume(mesh, label)?;
    volume.read_back(renderer.device(), renderer.queue())
}
