//! Widget runtime executor

use super::{WidgetHandle, WidgetSnapshot};
use crate::actions::{ActionContext, ActionRegistry};
use crate::config::WidgetConfig;
use crate::presenter::{AddMessage, CustomRenderer, Presenter, WidgetView};
use crate::state_machine::{
    transition, ActionOutcome, EngineContext, Effect, Event, SessionState, WidgetState,
};
use crate::store::{KeyValueStore, SessionStore};
use crate::sync::{ChatTransport, HistoryFetch, HistorySyncClient, SendOutcome};
use crate::tree::{PollHandle, TreeError, TreeProvider, TreeSource};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic widget runtime over storage, tree, chat and presentation seams
pub struct WidgetRuntime<K, S, C, P>
where
    K: KeyValueStore + 'static,
    S: TreeSource + 'static,
    C: ChatTransport + 'static,
    P: Presenter + 'static,
{
    context: EngineContext,
    state: WidgetState,
    store: SessionStore<K>,
    provider: TreeProvider<S>,
    update_interval_ms: i64,
    sync: Arc<HistorySyncClient<C>>,
    actions: ActionRegistry,
    presenter: P,
    renderer: Option<Arc<dyn CustomRenderer>>,
    /// Explicitly configured session id
    thread_id: Option<String>,
    session_id: Arc<str>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    event_tx: mpsc::UnboundedSender<Event>,
    snapshot_tx: watch::Sender<WidgetSnapshot>,
    shutdown: CancellationToken,
    poller: Option<PollHandle>,
    /// History requests dispatched so far; stamps each reply
    history_requests: u64,
    ready: bool,
}

impl<K, S, C, P> WidgetRuntime<K, S, C, P>
where
    K: KeyValueStore + 'static,
    S: TreeSource + 'static,
    C: ChatTransport + 'static,
    P: Presenter + 'static,
{
    pub fn new(
        config: &WidgetConfig,
        store: K,
        tree_source: Option<S>,
        transport: C,
        presenter: P,
        actions: ActionRegistry,
    ) -> (Self, WidgetHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = SessionState::new(config.initial_node.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(WidgetSnapshot::initial(session.clone()));
        let shutdown = CancellationToken::new();

        let runtime = Self {
            context: config.engine_context(&actions),
            state: WidgetState::new(session),
            store: SessionStore::new(
                store,
                config.storage_key_prefix.clone(),
                config.initial_node.clone(),
            ),
            provider: TreeProvider::new(tree_source, config.initial_tree.clone()),
            update_interval_ms: config.update_interval_ms,
            sync: Arc::new(HistorySyncClient::new(transport, config.sync_settings())),
            actions,
            presenter,
            renderer: None,
            thread_id: config.thread_id.clone(),
            session_id: Arc::from(""),
            event_rx,
            event_tx: event_tx.clone(),
            snapshot_tx,
            shutdown: shutdown.clone(),
            poller: None,
            history_requests: 0,
            ready: false,
        };

        let handle = WidgetHandle {
            event_tx,
            snapshot_rx,
            shutdown,
        };
        (runtime, handle)
    }

    /// Replace transcript rendering with a host renderer
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn CustomRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub async fn run(mut self) {
        self.boot().await;
        tracing::info!(session_id = %self.session_id, "Widget runtime started");

        let mut sending_rx = self.sync.sending().subscribe();
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                Some(event) = self.event_rx.recv() => {
                    self.process_event(event);
                }

                Ok(()) = sending_rx.changed() => {
                    let sending = *sending_rx.borrow_and_update();
                    self.presenter.set_sending(sending);
                    self.publish();
                }
            }
        }

        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        self.event_rx.close();
        tracing::info!(session_id = %self.session_id, "Widget runtime stopped");
    }

    /// Restore the session, load the tree and start polling
    async fn boot(&mut self) {
        if let Some(session) = self.store.load() {
            tracing::debug!(
                current_node = %session.current_node,
                messages = session.history.len(),
                "Restored session"
            );
            self.state.session = session;
        }
        self.session_id = Arc::from(self.store.resolve_session_id(self.thread_id.as_deref()));

        match self.provider.fetch_once().await {
            Ok(tree) => self.process_event(Event::TreeChanged {
                tree: Arc::new(tree),
            }),
            Err(TreeError::NotConfigured) => {
                tracing::debug!("No decision tree configured");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load decision tree, waiting for next poll");
            }
        }

        let event_tx = self.event_tx.clone();
        self.poller = self.provider.start_polling(
            self.update_interval_ms,
            self.state.tree.as_deref(),
            move |tree| {
                let _ = event_tx.send(Event::TreeChanged {
                    tree: Arc::new(tree),
                });
            },
        );

        self.ready = true;
        self.publish();
    }

    fn process_event(&mut self, event: Event) {
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "Event ignored");
                return;
            }
        };

        let was_open = self.state.is_open;
        self.state = result.new_state;
        if was_open != self.state.is_open {
            self.presenter.set_open(self.state.is_open);
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
        self.publish();
    }

    #[allow(clippy::too_many_lines)] // One arm per effect
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::PersistState => self.store.save(&self.state.session),

            Effect::RenderMessages => {
                let view = WidgetView::from_state(&self.state);
                match &self.renderer {
                    Some(renderer) => {
                        renderer.render(&view, &AddMessage::new(self.event_tx.clone()));
                    }
                    None => self.presenter.render_messages(&view),
                }
            }

            Effect::RenderOptions => {
                self.presenter
                    .render_options(&WidgetView::from_state(&self.state));
            }

            Effect::SyncMessage {
                text,
                meta,
                current_node,
            } => {
                let sync = Arc::clone(&self.sync);
                let session_id = Arc::clone(&self.session_id);
                let event_tx = self.event_tx.clone();
                let seq = self.next_history_seq();

                tokio::spawn(async move {
                    match sync
                        .send_message(&session_id, &text, &current_node, meta)
                        .await
                    {
                        SendOutcome::Failed => {
                            let _ = event_tx.send(Event::SendFailed);
                        }
                        SendOutcome::Sent {
                            refreshed: Some(history),
                        } => {
                            let _ = event_tx.send(Event::HistoryLoaded {
                                seq,
                                messages: history.messages,
                                current_node: history.current_node,
                            });
                        }
                        SendOutcome::Sent { refreshed: None } | SendOutcome::Unavailable => {}
                    }
                });
            }

            Effect::InvokeAction {
                action,
                option,
                current_node,
            } => {
                let event_tx = self.event_tx.clone();
                let Some(handler) = self.actions.get(&action) else {
                    tracing::warn!(action = %action, "Action vanished from registry");
                    let _ = event_tx.send(Event::ActionFinished {
                        action,
                        outcome: ActionOutcome::Failed {
                            error: "not registered".to_string(),
                        },
                    });
                    return;
                };
                let ctx = ActionContext {
                    option,
                    current_node,
                    tree: self.state.tree.clone(),
                };

                tokio::spawn(async move {
                    tracing::debug!(action = %action, "Running custom action");

                    // Inner task so a panicking handler surfaces as a JoinError
                    let outcome = match tokio::spawn(async move { handler.invoke(ctx).await }).await
                    {
                        Ok(Ok(())) => ActionOutcome::Completed,
                        Ok(Err(e)) => {
                            tracing::warn!(action = %action, error = %e, "Custom action failed");
                            ActionOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(action = %action, error = %e, "Custom action panicked");
                            ActionOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                    };
                    let _ = event_tx.send(Event::ActionFinished { action, outcome });
                });
            }

            Effect::FetchHistory => {
                let sync = Arc::clone(&self.sync);
                let session_id = Arc::clone(&self.session_id);
                let event_tx = self.event_tx.clone();
                let seq = self.next_history_seq();

                tokio::spawn(async move {
                    let event = match sync.fetch_history(&session_id).await {
                        Ok(HistoryFetch::Loaded(history)) => Event::HistoryLoaded {
                            seq,
                            messages: history.messages,
                            current_node: history.current_node,
                        },
                        Ok(HistoryFetch::Unavailable) => Event::ServerHistoryUnavailable,
                        Err(e) => {
                            tracing::warn!(error = %e, "Error loading messages from chat API");
                            Event::ServerHistoryUnavailable
                        }
                    };
                    let _ = event_tx.send(event);
                });
            }
        }
    }

    fn next_history_seq(&mut self) -> u64 {
        self.history_requests += 1;
        self.history_requests
    }

    fn publish(&self) {
        let snapshot = WidgetSnapshot {
            session: self.state.session.clone(),
            session_id: self.session_id.to_string(),
            is_open: self.state.is_open,
            has_tree: self.state.tree.is_some(),
            options: self.state.current_options().to_vec(),
            sending: self.sync.sending().is_sending(),
            ready: self.ready,
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}
