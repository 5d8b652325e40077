//! Cache of rendered views, keyed by logical path.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;

#[async_trait]
pub trait ViewCache: Send + Sync {
    /// Drop the cached rendering of `path` and of every path below it
    async fn invalidate(&self, path: &str);
}

#[derive(Default)]
pub struct InMemoryViewCache {
    views: RwLock<Views>,
}

#[derive(Default)]
struct Views {
    rendered: HashMap<String, String>,
    /// Bumped by every invalidation. A render only gets cached if no invalidation
    /// happened while it was running.
    generation: u64,
}

impl InMemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<String> {
        self.views.read().await.rendered.get(path).cloned()
    }

    /// Returns the cached rendering of `path`, rendering and caching it first if needed.
    /// Failed renders are not cached.
    pub async fn get_or_render<F, Fut>(&self, path: &str, render: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let generation = {
            let views = self.views.read().await;
            if let Some(view) = views.rendered.get(path) {
                log::debug!("View cache hit for {path}");
                return Ok(view.clone());
            }
            views.generation
        };
        log::debug!("View cache miss for {path}");
        let view = render().await?;

        let mut views = self.views.write().await;
        if views.generation == generation {
            views.rendered.insert(path.to_string(), view.clone());
        } else {
            log::debug!("View {path} was invalidated while rendering, not caching it");
        }
        Ok(view)
    }
}

#[async_trait]
impl ViewCache for InMemoryViewCache {
    async fn invalidate(&self, path: &str) {
        let mut views = self.views.write().await;
        views.generation += 1;
        let before = views.rendered.len();
        views
            .rendered
            .retain(|cached_path, _| !is_within(cached_path, path));
        log::debug!(
            "Invalidated {} cached view(s) under {path}",
            before - views.rendered.len()
        );
    }
}

fn is_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
