//! Navigation requests from components that do not own the router.
//!
//! The gateway (error pages) and the session store (logout) ask for
//! navigations through a [`Navigator`]; the router drains the channel and
//! performs them one at a time.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRequest {
    Push(String),
    /// Re-evaluate the current location from a clean slate.
    Reload,
}

pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);

    fn reload(&self);
}

/// Sending half: cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct NavigationQueue {
    tx: mpsc::UnboundedSender<NavigationRequest>,
}

/// Receiving half, consumed by [`Router::run`](crate::router::Router::run).
#[derive(Debug)]
pub struct NavigationReceiver {
    rx: mpsc::UnboundedReceiver<NavigationRequest>,
}

/// Requests received together, coalesced: the last push wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationBatch {
    pub target: Option<String>,
    pub reload: bool,
}

impl NavigationBatch {
    fn absorb(&mut self, request: NavigationRequest) {
        match request {
            NavigationRequest::Push(path) => self.target = Some(path),
            NavigationRequest::Reload => self.reload = true,
        }
    }
}

pub fn navigation_channel() -> (NavigationQueue, NavigationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NavigationQueue { tx }, NavigationReceiver { rx })
}

impl NavigationQueue {
    fn send(&self, request: NavigationRequest) {
        if self.tx.send(request).is_err() {
            tracing::debug!("navigation requested after the router stopped; ignored");
        }
    }
}

impl Navigator for NavigationQueue {
    fn push(&self, path: &str) {
        self.send(NavigationRequest::Push(path.to_string()));
    }

    fn reload(&self) {
        self.send(NavigationRequest::Reload);
    }
}

impl NavigationReceiver {
    /// Wait for the next request, then fold in everything already queued.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next_batch(&mut self) -> Option<NavigationBatch> {
        let first = self.rx.recv().await?;
        let mut batch = NavigationBatch::default();
        batch.absorb(first);
        while let Ok(next) = self.rx.try_recv() {
            batch.absorb(next);
        }
        Some(batch)
    }

    /// Coalesce whatever is queued right now; `None` when nothing is.
    pub fn try_next_batch(&mut self) -> Option<NavigationBatch> {
        let requests = self.drain();
        if requests.is_empty() {
            return None;
        }
        let mut batch = NavigationBatch::default();
        for request in requests {
            batch.absorb(request);
        }
        Some(batch)
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<NavigationRequest> {
        let mut requests = Vec::new();
        while let Ok(next) = self.rx.try_recv() {
            requests.push(next);
        }
        requests
    }
}
