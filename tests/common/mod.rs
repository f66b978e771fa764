//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::oneshot;

use strata::assets::{FetchFuture, Fetcher};
use strata::elements::{EmbeddedPlayer, Player, PlayerHost, YouTubeVideo};
use strata::error::FetchError;
use strata::scripting::{ScriptContext, ScriptHost, ScriptScope};

type FetchResult = Result<Vec<u8>, FetchError>;

/// Fetcher whose responses are settled by the test.
///
/// Sources registered with [`serve`](Self::serve) answer immediately; every
/// other fetch waits until the test calls [`resolve`](Self::resolve) or
/// [`fail`](Self::fail) for it, oldest first.
#[derive(Default)]
pub struct ScriptedFetcher {
    served: RefCell<HashMap<String, FetchResult>>,
    waiting: RefCell<HashMap<String, VecDeque<oneshot::Sender<FetchResult>>>>,
    requested: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn serve(&self, src: &str, bytes: &[u8]) {
        self.served
            .borrow_mut()
            .insert(src.to_string(), Ok(bytes.to_vec()));
    }

    pub fn resolve(&self, src: &str, bytes: &[u8]) -> bool {
        self.settle(src, Ok(bytes.to_vec()))
    }

    pub fn fail(&self, src: &str) -> bool {
        self.settle(src, Err(FetchError::NotFound(src.to_string())))
    }

    fn settle(&self, src: &str, result: FetchResult) -> bool {
        let sender = self
            .waiting
            .borrow_mut()
            .get_mut(src)
            .and_then(VecDeque::pop_front);
        match sender {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    pub fn waiting(&self, src: &str) -> usize {
        self.waiting.borrow().get(src).map_or(0, VecDeque::len)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, src: &str) -> FetchFuture {
        self.requested.borrow_mut().push(src.to_string());

        if let Some(result) = self.served.borrow().get(src).cloned() {
            return futures::future::ready(result).boxed_local();
        }

        let (tx, rx) = oneshot::channel();
        self.waiting
            .borrow_mut()
            .entry(src.to_string())
            .or_default()
            .push_back(tx);

        let src = src.to_string();
        async move {
            rx.await.unwrap_or_else(|_| {
                Err(FetchError::Aborted {
                    src,
                    message: "test dropped the fetch".into(),
                })
            })
        }
        .boxed_local()
    }
}

/// PNG bytes of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Let spawned local tasks run until they block again.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Script host that records the lifecycle of its contexts.
#[derive(Default)]
pub struct RecordingScripts {
    pub log: Rc<RefCell<Vec<String>>>,
}

struct RecordingContext {
    overlay: String,
    log: Rc<RefCell<Vec<String>>>,
}

impl ScriptHost for RecordingScripts {
    fn start(&self, scope: ScriptScope) -> Box<dyn ScriptContext> {
        self.log.borrow_mut().push(format!("start {}", scope.overlay));
        Box::new(RecordingContext {
            overlay: scope.overlay,
            log: Rc::clone(&self.log),
        })
    }
}

impl ScriptContext for RecordingContext {
    fn update_settings(&mut self, settings: &Rc<Value>) {
        self.log
            .borrow_mut()
            .push(format!("settings {} {}", self.overlay, settings));
    }

    fn destroy(self: Box<Self>) {
        self.log.borrow_mut().push(format!("destroy {}", self.overlay));
    }
}

/// Player host whose players become ready when the test says so.
#[derive(Default)]
pub struct ManualPlayers {
    pub commands: Rc<RefCell<Vec<String>>>,
    ready: RefCell<Vec<oneshot::Sender<()>>>,
    pub embedded: Cell<usize>,
}

struct RecordingPlayer {
    commands: Rc<RefCell<Vec<String>>>,
}

impl Player for RecordingPlayer {
    fn load_video(&self, video: &YouTubeVideo) {
        self.commands.borrow_mut().push(format!("load {}", video.id));
    }

    fn cue_video(&self, video: &YouTubeVideo) {
        self.commands.borrow_mut().push(format!("cue {}", video.id));
    }

    fn stop_video(&self) {
        self.commands.borrow_mut().push("stop".to_string());
    }
}

impl ManualPlayers {
    /// Make every player embedded so far ready.
    pub fn make_ready(&self) {
        for tx in self.ready.borrow_mut().drain(..) {
            let _ = tx.send(());
        }
    }
}

impl PlayerHost for ManualPlayers {
    fn embed(&self) -> EmbeddedPlayer {
        self.embedded.set(self.embedded.get() + 1);
        let (tx, rx) = oneshot::channel();
        self.ready.borrow_mut().push(tx);
        EmbeddedPlayer {
            player: Rc::new(RecordingPlayer {
                commands: Rc::clone(&self.commands),
            }),
            ready: async move {
                let _ = rx.await;
            }
            .boxed_local(),
        }
    }
}
