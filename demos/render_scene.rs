//! Render a JSON scene file and print the resulting tree.
//!
//! ```text
//! RUST_LOG=strata=debug cargo run --example render_scene -- scene.json
//! ```
//!
//! Remote asset sources are downloaded; relative ones are read from the scene
//! file's directory.

use std::path::Path;
use std::process::ExitCode;

use strata::events::SceneEvent;
use strata::{Renderer, RendererConfig, Scene};

/// Frames to wait for every overlay before giving up.
const MAX_FRAMES: u64 = 600;

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: render_scene <scene.json>");
        return ExitCode::FAILURE;
    };

    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(err) => {
            eprintln!("Could not read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let scene = match Scene::from_json(&json) {
        Ok(scene) => scene,
        Err(err) => {
            eprintln!("Invalid scene {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Could not start the runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let root = Path::new(&path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, render(scene, RendererConfig::new().asset_root(root)))
}

async fn render(scene: Scene, config: RendererConfig) -> ExitCode {
    let interval = config.frame_interval;
    let mut renderer = Renderer::with_config(config);
    let _events = renderer.subscribe(|event| match event {
        SceneEvent::Loaded { key, .. } => log::info!("Overlay '{key}' loaded"),
        SceneEvent::AssetsChanged { key, .. } => log::info!("Assets of overlay '{key}' changed"),
    });

    let stats = renderer.set_overlays(scene);
    log::info!("Initial render: {:?}", stats.total());

    let mut ticker = tokio::time::interval(interval);
    while !renderer.all_loaded() {
        ticker.tick().await;
        if renderer.frame() > MAX_FRAMES {
            eprintln!("Gave up waiting for the scene to load");
            print!("{}", renderer.describe());
            return ExitCode::FAILURE;
        }
    }

    print!("{}", renderer.describe());
    ExitCode::SUCCESS
}
