use std::sync::Arc;
use tokio::sync::watch;

use crate::capture::VideoFrame;

/// Live-preview target
///
/// Holds only the latest frame. Presentation code subscribes and renders
/// whatever is current; slow readers skip frames instead of queueing them.
#[derive(Clone)]
pub struct PreviewSink {
    tx: watch::Sender<Option<Arc<VideoFrame>>>,
}

impl PreviewSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.tx.subscribe()
    }

    /// Most recent frame, if the session has produced one
    pub fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.tx.borrow().clone()
    }

    pub(crate) fn publish(&self, frame: Arc<VideoFrame>) {
        self.tx.send_replace(Some(frame));
    }

    pub(crate) fn clear(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for PreviewSink {
    fn default() -> Self {
        Self::new()
    }
}
