mod common;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tokio::task::LocalSet;

use common::{png, settle, ManualPlayers, RecordingScripts, ScriptedFetcher};
use strata::assets::AssetDescriptor;
use strata::elements::{ElementRegistry, ImageElement, ResolvedUrl, TextElement, VideoElement, VideoSource};
use strata::events::SceneEvent;
use strata::tree::{SceneTree, Visual};
use strata::{LayerData, OverlayData, Renderer, RendererConfig, Scene, StrataError};

struct Fixture {
    renderer: Renderer,
    fetcher: Rc<ScriptedFetcher>,
    scripts: Rc<RefCell<Vec<String>>>,
    players: Rc<ManualPlayers>,
    events: Rc<RefCell<Vec<SceneEvent>>>,
    _subscription: strata::events::Subscription,
}

fn fixture() -> Fixture {
    fixture_with(RendererConfig::new())
}

fn fixture_with(config: RendererConfig) -> Fixture {
    let fetcher = ScriptedFetcher::new();
    let scripts = Rc::new(RecordingScripts::default());
    let log = Rc::clone(&scripts.log);
    let players = Rc::new(ManualPlayers::default());

    let renderer = Renderer::builder()
        .config(config)
        .fetcher(fetcher.clone())
        .script_host(scripts)
        .player_host(players.clone())
        .build();

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let subscription = renderer.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    Fixture {
        renderer,
        fetcher,
        scripts: log,
        players,
        events,
        _subscription: subscription,
    }
}

fn rectangle(id: &str, width: f64) -> LayerData {
    LayerData::new(id, "rectangle").with_prop("width", width)
}

fn scene(overlays: Vec<OverlayData>) -> Scene {
    Scene::from(overlays)
}

fn loaded_events(events: &[SceneEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, SceneEvent::Loaded { .. }))
        .count()
}

#[tokio::test]
async fn test_layer_updates_in_place() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer
                .set_overlays(scene(vec![OverlayData::new("o").with_layer(rectangle("r", 100.0))]));
            let overlay = f.renderer.overlay_node("o").unwrap();
            let layer = f.renderer.layer_node("o", "r").unwrap();

            let pass = f
                .renderer
                .set_overlays(scene(vec![OverlayData::new("o").with_layer(rectangle("r", 200.0))]));

            assert_eq!(pass.total().created, 0);
            assert_eq!(pass.overlays.updated, 1);
            assert_eq!(pass.layers.updated, 1);
            assert_eq!(f.renderer.overlay_node("o"), Some(overlay));
            assert_eq!(f.renderer.layer_node("o", "r"), Some(layer));

            let tree = f.renderer.tree();
            let live = tree.layer(layer).unwrap();
            assert_eq!(live.common().width, 200.0);
            // Defaults of the kind survive the update
            assert_eq!(live.common().height, 360.0);
            assert_eq!(live.prop("backgroundColor"), Some(json!("#FF0000")));
        })
        .await;
}

#[tokio::test]
async fn test_same_scene_is_a_no_op() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            let first = scene(vec![
                OverlayData::new("a").with_layer(rectangle("r", 10.0)),
                OverlayData::new("b").with_layer(LayerData::new("t", "text").with_prop("text", "hi")),
            ]);
            f.renderer.set_overlays(first.clone());
            settle().await;
            f.renderer.frame();
            settle().await;
            assert!(!f.renderer.take_dirty().is_empty());

            let pass = f.renderer.set_overlays(first);
            assert_eq!(pass.total().mutations(), 0);
            assert_eq!(pass.overlays.skipped, 2);
            assert!(f.renderer.take_dirty().is_empty());
            assert_eq!(f.renderer.stats().passes, 2);
        })
        .await;
}

#[tokio::test]
async fn test_reorder_keeps_nodes_and_prunes_removed() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            let layers = |ids: &[&str]| {
                ids.iter()
                    .fold(OverlayData::new("o"), |overlay, id| overlay.with_layer(rectangle(id, 10.0)))
            };

            f.renderer.set_overlays(scene(vec![layers(&["a", "b", "c"])]));
            let a = f.renderer.layer_node("o", "a").unwrap();
            let b = f.renderer.layer_node("o", "b").unwrap();
            let c = f.renderer.layer_node("o", "c").unwrap();

            let pass = f.renderer.set_overlays(scene(vec![layers(&["c", "a", "b"])]));
            assert_eq!(pass.layers.created, 0);
            assert!(pass.layers.moved >= 1);
            {
                let tree = f.renderer.tree();
                let overlay = f.renderer.overlay_node("o").unwrap();
                assert_eq!(tree.children(overlay), &[c, a, b]);
            }

            let pass = f.renderer.set_overlays(scene(vec![layers(&["a"])]));
            assert_eq!(pass.layers.removed, 2);
            let tree = f.renderer.tree();
            assert!(tree.contains(a));
            assert!(!tree.contains(b));
            assert!(!tree.contains(c));
        })
        .await;
}

#[tokio::test]
async fn test_kind_change_replaces_node() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer
                .set_overlays(scene(vec![OverlayData::new("o").with_layer(rectangle("x", 10.0))]));
            let old = f.renderer.layer_node("o", "x").unwrap();

            let pass = f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_layer(LayerData::new("x", "text").with_prop("text", "now text"))]));
            assert_eq!(pass.layers.created, 1);

            let new = f.renderer.layer_node("o", "x").unwrap();
            assert_ne!(old, new);
            let tree = f.renderer.tree();
            assert!(!tree.contains(old));
            let text = tree.layer(new).unwrap().element_as::<TextElement>().unwrap();
            assert_eq!(text.text(), "now text");
        })
        .await;
}

#[tokio::test]
async fn test_unknown_and_missing_kinds_are_skipped() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            let parsed = Scene::from_json(
                r#"[{"id":"o","layers":[
                    {"id":"nameless"},
                    {"id":"w","elementKind":"widget"},
                    {"id":"r","elementName":"rectangle","width":50}
                ]}]"#,
            )
            .unwrap();

            let pass = f.renderer.set_overlays(parsed);
            assert_eq!(pass.layers.failed, 2);
            assert_eq!(pass.layers.created, 1);
            assert!(f.renderer.layer_node("o", "w").is_none());
            assert!(f.renderer.layer_node("o", "nameless").is_none());

            let r = f.renderer.layer_node("o", "r").unwrap();
            assert_eq!(f.renderer.tree().layer(r).unwrap().common().width, 50.0);
        })
        .await;
}

#[tokio::test]
async fn test_disallowed_prop_is_skipped() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o").with_layer(
                rectangle("r", 10.0)
                    .with_prop("src", "https://example.com/a.png")
                    .with_prop("opacity", 0.5),
            )]));

            let r = f.renderer.layer_node("o", "r").unwrap();
            let tree = f.renderer.tree();
            let layer = tree.layer(r).unwrap();
            assert_eq!(layer.prop("src"), None);
            assert_eq!(layer.common().opacity, Some(0.5));
        })
        .await;
}

#[tokio::test]
async fn test_image_asset_resolves_after_batch() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_asset("logo", AssetDescriptor::new("logo.png"))
                .with_layer(LayerData::new("img", "image").with_prop("src", "#logo"))]));

            let img = f.renderer.layer_node("o", "img").unwrap();
            {
                let tree = f.renderer.tree();
                let image = tree.layer(img).unwrap().element_as::<ImageElement>().unwrap();
                assert_eq!(image.resolved(), &ResolvedUrl::Pending);
                assert_eq!(tree.layer(img).unwrap().asset_refs().get("src"), Some("#logo"));
            }

            f.fetcher.resolve("logo.png", &png(32, 16));
            settle().await;

            let tree = f.renderer.tree();
            let layer = tree.layer(img).unwrap();
            let image = layer.element_as::<ImageElement>().unwrap();
            assert!(image.resolved().url().is_some_and(|url| url.starts_with("blob:")));
            assert_eq!(layer.natural_size(), Some((32, 16)));
            assert_eq!(
                f.events.borrow().as_slice(),
                &[SceneEvent::AssetsChanged {
                    overlay: f.renderer.overlay_node("o").unwrap(),
                    key: "o".into(),
                }]
            );
        })
        .await;
}

#[tokio::test]
async fn test_missing_asset_reference() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_layer(LayerData::new("img", "image").with_prop("src", "#nothing"))]));
            settle().await;

            let img = f.renderer.layer_node("o", "img").unwrap();
            let tree = f.renderer.tree();
            let image = tree.layer(img).unwrap().element_as::<ImageElement>().unwrap();
            assert_eq!(image.resolved(), &ResolvedUrl::Missing);
        })
        .await;
}

#[tokio::test]
async fn test_overlay_loads_once_and_starts_scripts() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_scripts(json!(["main.js"]))
                .with_settings(json!({"color": "red"}))
                .with_layer(rectangle("r", 10.0))]));
            settle().await;
            assert!(!f.renderer.is_loaded("o"));
            assert!(f.scripts.borrow().is_empty());

            f.renderer.frame();
            settle().await;
            assert!(f.renderer.is_loaded("o"));
            assert!(f.renderer.all_loaded());
            assert_eq!(loaded_events(&f.events.borrow()), 1);
            assert_eq!(f.scripts.borrow().as_slice(), &["start o".to_string()]);

            // Already running
            assert!(!f.renderer.execute_scripts("o"));
            assert!(f.renderer.reset_scripts("o"));
            assert!(!f.renderer.reset_scripts("o"));
            assert!(f.renderer.execute_scripts("o"));

            // Later frames and updates do not load again
            f.renderer.frame();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_settings(json!({"color": "blue"}))
                .with_layer(rectangle("r", 20.0))]));
            settle().await;
            assert_eq!(loaded_events(&f.events.borrow()), 1);

            f.renderer.set_overlays(Scene::default());
            assert_eq!(
                f.scripts.borrow().as_slice(),
                &[
                    "start o".to_string(),
                    "destroy o".to_string(),
                    "start o".to_string(),
                    r#"settings o {"color":"blue"}"#.to_string(),
                    "destroy o".to_string(),
                ]
            );
        })
        .await;
}

#[tokio::test]
async fn test_scripts_can_wait_for_the_host() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture_with(RendererConfig::new().execute_scripts_on_load(false));
            f.renderer.set_overlays(scene(vec![
                OverlayData::new("manual"),
                OverlayData::new("eager").with_execute_scripts_on_load(true),
            ]));
            f.renderer.frame();
            settle().await;

            assert!(f.renderer.all_loaded());
            assert_eq!(f.scripts.borrow().as_slice(), &["start eager".to_string()]);
        })
        .await;
}

#[tokio::test]
async fn test_load_waits_for_a_borrowed_tree() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer
                .set_overlays(scene(vec![OverlayData::new("A").with_layer(rectangle("L1", 10.0))]));
            settle().await;

            {
                let _tree = f.renderer.tree();
                f.renderer.frame();
                settle().await;
            }
            assert!(!f.renderer.is_loaded("A"));
            assert_eq!(loaded_events(&f.events.borrow()), 0);

            f.renderer.frame();
            settle().await;
            assert!(f.renderer.is_loaded("A"));
            assert_eq!(loaded_events(&f.events.borrow()), 1);
            assert_eq!(f.scripts.borrow().as_slice(), &["start A".to_string()]);
        })
        .await;
}

#[tokio::test]
async fn test_asset_refresh_waits_for_a_borrowed_tree() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o")
                .with_asset("logo", AssetDescriptor::new("logo.png"))
                .with_layer(LayerData::new("img", "image").with_prop("src", "#logo"))]));
            let img = f.renderer.layer_node("o", "img").unwrap();

            {
                let _tree = f.renderer.tree();
                f.fetcher.resolve("logo.png", &png(8, 8));
                settle().await;
            }
            {
                let tree = f.renderer.tree();
                let image = tree.layer(img).unwrap().element_as::<ImageElement>().unwrap();
                assert_eq!(image.resolved(), &ResolvedUrl::Pending);
            }
            assert!(f.events.borrow().is_empty());

            f.renderer.frame();
            settle().await;
            let tree = f.renderer.tree();
            assert_eq!(tree.layer(img).unwrap().natural_size(), Some((8, 8)));
            assert!(f
                .events
                .borrow()
                .iter()
                .any(|event| matches!(event, SceneEvent::AssetsChanged { key, .. } if key == "o")));
        })
        .await;
}

#[tokio::test]
async fn test_youtube_player_holds_the_gate() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.renderer.set_overlays(scene(vec![OverlayData::new("o").with_layer(
                LayerData::new("v", "video")
                    .with_prop("autoplay", true)
                    .with_prop("src", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            )]));
            assert_eq!(f.players.embedded.get(), 1);

            f.renderer.frame();
            settle().await;
            assert!(!f.renderer.is_loaded("o"));
            assert!(f.players.commands.borrow().is_empty());

            f.players.make_ready();
            settle().await;
            assert!(f.renderer.is_loaded("o"));
            assert_eq!(f.players.commands.borrow().as_slice(), &["load dQw4w9WgXcQ".to_string()]);

            let v = f.renderer.layer_node("o", "v").unwrap();
            let tree = f.renderer.tree();
            let layer = tree.layer(v).unwrap();
            let video = layer.element_as::<VideoElement>().unwrap();
            assert!(video.player_ready());
            assert!(matches!(video.source(), VideoSource::YouTube(video) if video.id == "dQw4w9WgXcQ"));
            assert_eq!(layer.natural_size(), Some((1280, 720)));
        })
        .await;
}

#[tokio::test]
async fn test_removed_overlay_releases_assets() {
    LocalSet::new()
        .run_until(async {
            let mut f = fixture();
            f.fetcher.serve("bg.png", &png(4, 4));
            f.renderer.set_overlays(scene(vec![
                OverlayData::new("keep"),
                OverlayData::new("drop").with_asset("bg", AssetDescriptor::new("bg.png")),
            ]));
            settle().await;
            let dropped = f.renderer.overlay_node("drop").unwrap();
            assert!(f.renderer.tree().overlay(dropped).unwrap().assets_available());

            let pass = f.renderer.set_overlays(scene(vec![OverlayData::new("keep")]));
            assert_eq!(pass.overlays.removed, 1);
            assert!(!f.renderer.tree().contains(dropped));
            assert!(f.renderer.overlay_node("keep").is_some());
        })
        .await;
}

#[test]
fn test_layer_outside_overlay_is_rejected() {
    let registry = ElementRegistry::with_builtins();
    let spec = registry.get("rectangle").unwrap();

    let mut tree = SceneTree::new();
    let group = tree.register(Visual::Group);
    let result = tree.create_layer(group, "r", spec);
    assert!(matches!(result, Err(StrataError::LayerOutsideOverlay { parent }) if parent == group));

    tree.unregister(group);
    assert!(matches!(tree.create_layer(group, "r", spec), Err(StrataError::StaleNode(_))));
}
