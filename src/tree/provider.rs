//! Tree provider: one-shot fetch plus fixed-interval polling

use super::{DecisionTree, TreeError, TreeSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Supplies decision trees from either a static tree or a remote source
pub struct TreeProvider<S> {
    source: Option<Arc<S>>,
    static_tree: Option<DecisionTree>,
}

impl<S: TreeSource + 'static> TreeProvider<S> {
    pub fn new(source: Option<S>, static_tree: Option<DecisionTree>) -> Self {
        Self {
            source: source.map(Arc::new),
            static_tree,
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Fetch the tree once. A static tree short-circuits the network.
    pub async fn fetch_once(&self) -> Result<DecisionTree, TreeError> {
        if let Some(tree) = &self.static_tree {
            return Ok(tree.clone());
        }
        match &self.source {
            Some(source) => source.fetch().await,
            None => Err(TreeError::NotConfigured),
        }
    }

    /// Start refreshing the tree every `interval_ms`.
    ///
    /// Returns `None` without spawning anything when the interval is not
    /// positive or there is no remote source. Failed ticks are logged and
    /// skipped; the next tick retries at the same interval.
    pub fn start_polling<F>(
        &self,
        interval_ms: i64,
        last_known: Option<&DecisionTree>,
        on_changed: F,
    ) -> Option<PollHandle>
    where
        F: Fn(DecisionTree) + Send + 'static,
    {
        let source = Arc::clone(self.source.as_ref()?);
        let period = match u64::try_from(interval_ms) {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => return None,
        };

        // An absent tree compares like an empty one
        let mut last = last_known.map_or_else(
            || DecisionTree::new().canonical_json(),
            DecisionTree::canonical_json,
        );

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match source.fetch().await {
                    Ok(tree) => {
                        let serialized = tree.canonical_json();
                        if serialized == last {
                            tracing::trace!("Decision tree unchanged");
                        } else {
                            tracing::info!(nodes = tree.len(), "Decision tree changed");
                            last = serialized;
                            on_changed(tree);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Tree poll failed, retrying next tick");
                    }
                }
            }
            tracing::debug!("Tree polling stopped");
        });

        Some(PollHandle { token, task })
    }
}

/// Owns a polling task; dropping it stops the task
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
