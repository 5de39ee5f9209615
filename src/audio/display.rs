use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

use super::snapshot::SessionSnapshot;

/// Renders a session's state for users.
///
/// Every call is fire-and-forget from the session's point of view:
/// implementations log their own failures.
#[async_trait]
pub trait PlayerDisplay: Send + Sync {
    async fn render_now_playing(&self, snapshot: &SessionSnapshot);
    async fn render_queue(&self, snapshot: &SessionSnapshot, page: usize);
    async fn clear(&self);
    /// Posts a one-off message (failures, auto-disconnect, ...).
    async fn notify(&self, message: &str);
}

#[derive(Debug, Clone)]
pub(crate) enum DisplayUpdate {
    NowPlaying(Arc<SessionSnapshot>),
    Queue(Arc<SessionSnapshot>, usize),
    Clear,
    Notice(String),
}

/// Spawns the worker that feeds updates to the display in order.
///
/// The worker ends once every sender is dropped.
pub(crate) fn spawn_display_worker(display: Arc<dyn PlayerDisplay>) -> UnboundedSender<DisplayUpdate> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DisplayUpdate>();

    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update {
                DisplayUpdate::NowPlaying(snapshot) => display.render_now_playing(&snapshot).await,
                DisplayUpdate::Queue(snapshot, page) => display.render_queue(&snapshot, page).await,
                DisplayUpdate::Clear => display.clear().await,
                DisplayUpdate::Notice(message) => display.notify(&message).await,
            }
        }
        debug!("🖼️ Display worker finished");
    });

    tx
}
