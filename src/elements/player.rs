//! Embedded third-party video players.
//!
//! Player embedding itself is a host concern. The renderer only asks a
//! [`PlayerHost`] for a player plus a readiness future, registers that
//! future with the overlay's readiness gate, and queues commands until the
//! player is ready.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use super::video::YouTubeVideo;

/// Commands the video element sends to its player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Load and start playing
    Load(YouTubeVideo),
    /// Load without playing
    Cue(YouTubeVideo),
    Stop,
}

/// An embedded player instance.
pub trait Player {
    fn load_video(&self, video: &YouTubeVideo);
    fn cue_video(&self, video: &YouTubeVideo);
    fn stop_video(&self);

    /// Remove the player. Called once, when the owning layer goes away.
    fn destroy(&self) {}
}

/// A freshly embedded player and the future that resolves once it can take
/// commands.
pub struct EmbeddedPlayer {
    pub player: Rc<dyn Player>,
    pub ready: LocalBoxFuture<'static, ()>,
}

/// Creates embedded players.
pub trait PlayerHost {
    fn embed(&self) -> EmbeddedPlayer;
}

/// Host for environments without an embedding API: players are ready at
/// once and only log the commands they receive.
#[derive(Debug, Default)]
pub struct DetachedPlayerHost;

struct DetachedPlayer;

impl Player for DetachedPlayer {
    fn load_video(&self, video: &YouTubeVideo) {
        log::debug!("Detached player: load {}", video.id);
    }

    fn cue_video(&self, video: &YouTubeVideo) {
        log::debug!("Detached player: cue {}", video.id);
    }

    fn stop_video(&self) {
        log::debug!("Detached player: stop");
    }
}

impl PlayerHost for DetachedPlayerHost {
    fn embed(&self) -> EmbeddedPlayer {
        EmbeddedPlayer {
            player: Rc::new(DetachedPlayer),
            ready: futures::future::ready(()).boxed_local(),
        }
    }
}

/// A player owned by a video element, with commands queued until ready.
pub(crate) struct PlayerSlot {
    player: Rc<dyn Player>,
    ready: Rc<Cell<bool>>,
    queued: Rc<RefCell<Option<PlayerCommand>>>,
}

impl PlayerSlot {
    /// Embed a player and wait for it in the background.
    ///
    /// Returns the slot and a future that settles once the player is ready,
    /// for the readiness gate. Must be called inside a `LocalSet`.
    pub(crate) fn embed(host: &dyn PlayerHost) -> (Self, impl std::future::Future<Output = ()>) {
        let EmbeddedPlayer { player, ready } = host.embed();
        let slot = Self {
            player,
            ready: Rc::new(Cell::new(false)),
            queued: Rc::new(RefCell::new(None)),
        };

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let player = Rc::clone(&slot.player);
        let is_ready = Rc::clone(&slot.ready);
        let queued = Rc::clone(&slot.queued);
        tokio::task::spawn_local(async move {
            ready.await;
            is_ready.set(true);
            let command = queued.borrow_mut().take();
            if let Some(command) = command {
                apply(player.as_ref(), &command);
            }
            let _ = ready_tx.send(());
        });

        let settled = async move {
            // A dropped sender also counts as settled
            let _ = ready_rx.await;
        };
        (slot, settled)
    }

    /// Send a command now, or once the player is ready. Only the latest
    /// queued command is kept, each one supersedes the previous.
    pub(crate) fn send(&self, command: PlayerCommand) {
        if self.ready.get() {
            apply(self.player.as_ref(), &command);
        } else {
            *self.queued.borrow_mut() = Some(command);
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.get()
    }
}

impl Drop for PlayerSlot {
    fn drop(&mut self) {
        self.queued.borrow_mut().take();
        self.player.destroy();
    }
}

fn apply(player: &dyn Player, command: &PlayerCommand) {
    match command {
        PlayerCommand::Load(video) => player.load_video(video),
        PlayerCommand::Cue(video) => player.cue_video(video),
        PlayerCommand::Stop => player.stop_video(),
    }
}
