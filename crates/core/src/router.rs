//! Client-side route table and navigation history.
//!
//! Matching is by exact path, with a `*` entry as the not-found fallback.
//! The resolved current route is published through a watch channel, so
//! back/forward moves reach subscribers the same way explicit navigation
//! does.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Path that matches when nothing else does.
pub const WILDCARD_PATH: &str = "*";

/// Route metadata consumed by the application's guards; the router itself
/// does not enforce it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub permission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    #[serde(default)]
    pub meta: RouteMeta,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            meta: RouteMeta::default(),
        }
    }

    pub fn with_meta(path: impl Into<String>, meta: RouteMeta) -> Self {
        Self {
            path: path.into(),
            meta,
        }
    }
}

struct HistoryState {
    back: Vec<String>,
    current: String,
    forward: Vec<String>,
}

/// Route table plus browser-style history stacks.
pub struct Router {
    routes: Vec<Route>,
    history: Mutex<HistoryState>,
    current: watch::Sender<Option<Route>>,
}

impl Router {
    /// Build a router over `routes`, starting at `/`.
    pub fn new(routes: Vec<Route>) -> Self {
        let initial = "/".to_string();
        let (current, _) = watch::channel(None);
        let router = Self {
            routes,
            history: Mutex::new(HistoryState {
                back: Vec::new(),
                current: initial.clone(),
                forward: Vec::new(),
            }),
            current,
        };
        router.publish(&initial);
        router
    }

    /// Resolve a path against the table: exact match first, wildcard
    /// fallback second.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.path == path)
            .or_else(|| self.routes.iter().find(|route| route.path == WILDCARD_PATH))
    }

    /// Navigate to `path`: the current entry moves onto the back stack and
    /// the forward stack is discarded.
    pub fn navigate(&self, path: &str) {
        {
            let mut history = self.history.lock().expect("router history lock poisoned");
            let previous = std::mem::replace(&mut history.current, path.to_string());
            history.back.push(previous);
            history.forward.clear();
        }
        debug!(path, "navigated");
        self.publish(path);
    }

    /// Step back through history, as the browser back button would.
    /// Returns `false` when there is nowhere to go.
    pub fn back(&self) -> bool {
        let path = {
            let mut history = self.history.lock().expect("router history lock poisoned");
            let Some(previous) = history.back.pop() else {
                return false;
            };
            let displaced = std::mem::replace(&mut history.current, previous.clone());
            history.forward.push(displaced);
            previous
        };
        debug!(path, "navigated back");
        self.publish(&path);
        true
    }

    /// Step forward through history. Returns `false` when there is nowhere
    /// to go.
    pub fn forward(&self) -> bool {
        let path = {
            let mut history = self.history.lock().expect("router history lock poisoned");
            let Some(next) = history.forward.pop() else {
                return false;
            };
            let displaced = std::mem::replace(&mut history.current, next.clone());
            history.back.push(displaced);
            next
        };
        debug!(path, "navigated forward");
        self.publish(&path);
        true
    }

    pub fn current_path(&self) -> String {
        self.history
            .lock()
            .expect("router history lock poisoned")
            .current
            .clone()
    }

    /// The resolved current route, `None` when the path matches nothing
    /// and no wildcard is registered.
    pub fn current(&self) -> Option<Route> {
        self.current.borrow().clone()
    }

    /// Subscribe to the resolved current route; updated on navigate, back,
    /// and forward.
    pub fn subscribe(&self) -> watch::Receiver<Option<Route>> {
        self.current.subscribe()
    }

    fn publish(&self, path: &str) {
        self.current.send_replace(self.resolve(path).cloned());
    }
}
