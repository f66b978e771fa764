//! Frame clock: the "next rendering opportunity".
//!
//! Hosts advance the clock once per presented frame, either by calling
//! [`FrameClock::tick`] from their own loop or by running
//! [`FrameClock::drive`] on the local task set. Async code waits for the
//! next tick with [`FrameClock::next_frame`].

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;

struct FrameInner {
    frame: Cell<u64>,
    notify: Notify,
}

/// Shared frame counter with async waiters.
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<FrameInner>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(FrameInner {
                frame: Cell::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Number of frames presented so far.
    pub fn current(&self) -> u64 {
        self.inner.frame.get()
    }

    /// Advance to the next frame and wake everything waiting for it.
    pub fn tick(&self) -> u64 {
        let frame = self.inner.frame.get() + 1;
        self.inner.frame.set(frame);
        self.inner.notify.notify_waiters();
        frame
    }

    /// Resolve at the first tick after this call.
    ///
    /// The current frame is read when this is called, not when the future is
    /// first polled, so a tick between the two is not missed.
    pub fn next_frame(&self) -> impl Future<Output = u64> + 'static {
        let clock = self.clone();
        let start = self.current();
        async move { clock.frame_after(start).await }
    }

    /// Resolve once the clock has moved past `frame`.
    pub async fn frame_after(&self, frame: u64) -> u64 {
        loop {
            // Created before the check so a tick in between is not missed
            let notified = self.inner.notify.notified();
            let current = self.inner.frame.get();
            if current > frame {
                return current;
            }
            notified.await;
        }
    }

    /// Tick forever at a fixed interval.
    pub async fn drive(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
