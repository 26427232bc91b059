use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{GridError, Result};
use crate::tree::NodeKey;

/// Default interval between idle ticks.
pub const DEFAULT_TICK_RATE: Duration = Duration::from_millis(50);

/// Events delivered to the grid between ticks.
#[derive(Debug)]
pub enum GridEvent<R> {
    /// A fetch resolved. `rows` is `None` when the fetcher had nothing.
    ChildrenLoaded { key: NodeKey, rows: Option<Vec<R>> },
    /// A fetch task died before producing a result.
    FetchFailed { key: NodeKey, reason: String },
    /// Periodic tick so time-bounded work can notice its deadline.
    Tick,
}

/// Channel that fetch tasks report into, plus the idle tick.
pub struct EventHandler<R> {
    rx: mpsc::UnboundedReceiver<GridEvent<R>>,
    tx: mpsc::UnboundedSender<GridEvent<R>>,
    tick_rate: Duration,
}

impl<R> EventHandler<R> {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx, tick_rate }
    }

    /// Get a sender clone for fetch tasks to report completion.
    pub fn sender(&self) -> mpsc::UnboundedSender<GridEvent<R>> {
        self.tx.clone()
    }

    /// Receive the next event, or a `Tick` if nothing arrives within the
    /// tick rate.
    pub async fn next(&mut self) -> Result<GridEvent<R>> {
        tokio::select! {
            event = self.rx.recv() => event.ok_or(GridError::ChannelClosed),
            _ = tokio::time::sleep(self.tick_rate) => Ok(GridEvent::Tick),
        }
    }
}
