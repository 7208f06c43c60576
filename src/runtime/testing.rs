//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::actions::{ActionHandler, ActionRegistry};
use crate::config::WidgetConfig;
use crate::presenter::{CustomRenderer, Presenter, WidgetView};
use crate::runtime::{WidgetHandle, WidgetRuntime, WidgetSnapshot};
use crate::state_machine::{Message, Sender};
use crate::store::MemoryStore;
use crate::sync::{ChatTransport, MessageMeta, OutgoingMessage, ServerHistory, SyncError};
use crate::tree::{DecisionTree, TreeError, TreeSource};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Chat Transport
// ============================================================================

#[derive(Default)]
struct ChatBackend {
    /// Transcript built from accepted posts
    transcript: Vec<Message>,
    /// Fixed GET response, when set
    fixed: Option<ServerHistory>,
    posted: Vec<OutgoingMessage>,
}

/// In-memory chat backend. Accepted posts are appended to the transcript
/// unless a fixed history was set.
#[derive(Default)]
pub struct MockChatTransport {
    backend: Mutex<ChatBackend>,
    get_calls: AtomicUsize,
    fail_posts: AtomicBool,
    fail_gets: AtomicBool,
    panic_on_post: AtomicBool,
    /// Delay applied to the first GET after it read the transcript
    slow_first_get: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl MockChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this history from now on, regardless of posts
    pub fn set_history(&self, history: ServerHistory) {
        self.backend.lock().unwrap().fixed = Some(history);
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_post(&self, panic: bool) {
        self.panic_on_post.store(panic, Ordering::SeqCst);
    }

    /// The first GET answers with the transcript as it was when called,
    /// but only after `delay`
    pub fn slow_first_get(&self, delay: Duration) {
        *self.slow_first_get.lock().unwrap() = Some(delay);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Every POST body received, including rejected ones
    pub fn posted(&self) -> Vec<OutgoingMessage> {
        self.backend.lock().unwrap().posted.clone()
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn get_messages(&self, _session_id: &str) -> Result<ServerHistory, SyncError> {
        let call = self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(SyncError::Fetch("mock GET failure".to_string()));
        }
        let history = {
            let backend = self.backend.lock().unwrap();
            backend.fixed.clone().unwrap_or_else(|| ServerHistory {
                messages: backend.transcript.clone(),
                current_node: None,
            })
        };
        let delay = *self.slow_first_get.lock().unwrap();
        if let (0, Some(delay)) = (call, delay) {
            tokio::time::sleep(delay).await;
        }
        Ok(history)
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SyncError> {
        assert!(
            !self.panic_on_post.load(Ordering::SeqCst),
            "mock transport panic"
        );
        let mut backend = self.backend.lock().unwrap();
        backend.posted.push(message.clone());
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(SyncError::Fetch("mock POST failure".to_string()));
        }
        let from = match message.meta {
            MessageMeta::BotMessage { .. } => Sender::Bot,
            _ => Sender::User,
        };
        backend.transcript.push(Message {
            text: message.text.clone(),
            from,
        });
        Ok(())
    }
}

// ============================================================================
// Mock Tree Source
// ============================================================================

/// Serves the current tree; `None` makes fetches fail
#[derive(Default)]
pub struct MockTreeSource {
    tree: Mutex<Option<DecisionTree>>,
    fetches: AtomicUsize,
}

#[allow(dead_code)]
impl MockTreeSource {
    pub fn new(tree: Option<DecisionTree>) -> Self {
        Self {
            tree: Mutex::new(tree),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_tree(&self, tree: Option<DecisionTree>) {
        *self.tree.lock().unwrap() = tree;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TreeSource for MockTreeSource {
    async fn fetch(&self) -> Result<DecisionTree, TreeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tree
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TreeError::Fetch("mock tree unavailable".to_string()))
    }
}

// ============================================================================
// Recording Presenter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterCall {
    Messages(Vec<Message>),
    Options(Vec<String>),
    Sending(bool),
    Open(bool),
}

/// Presenter that records every call
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<PresenterCall>>,
}

#[allow(dead_code)]
impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn message_renders(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PresenterCall::Messages(_)))
            .count()
    }

    pub fn sending_changes(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PresenterCall::Sending(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PresenterCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Presenter for RecordingPresenter {
    fn render_messages(&self, view: &WidgetView<'_>) {
        self.record(PresenterCall::Messages(view.history.to_vec()));
    }

    fn render_options(&self, view: &WidgetView<'_>) {
        self.record(PresenterCall::Options(
            view.options.iter().map(|o| o.text.clone()).collect(),
        ));
    }

    fn set_sending(&self, sending: bool) {
        self.record(PresenterCall::Sending(sending));
    }

    fn set_open(&self, open: bool) {
        self.record(PresenterCall::Open(open));
    }
}

// ============================================================================
// Test Widget Builder
// ============================================================================

pub const WAIT: Duration = Duration::from_secs(2);

/// Running widget wired to mocks
pub struct TestWidget {
    pub handle: WidgetHandle,
    pub store: Arc<MemoryStore>,
    pub trees: Arc<MockTreeSource>,
    pub transport: Arc<MockChatTransport>,
    pub presenter: Arc<RecordingPresenter>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestWidget {
    pub fn builder() -> TestWidgetBuilder {
        TestWidgetBuilder::new()
    }

    /// Wait until boot finished
    pub async fn ready(&self) -> WidgetSnapshot {
        self.wait_for(|s| s.ready).await
    }

    /// Wait for a snapshot matching `predicate`, panicking on timeout
    pub async fn wait_for<F>(&self, predicate: F) -> WidgetSnapshot
    where
        F: FnMut(&WidgetSnapshot) -> bool,
    {
        self.handle
            .wait_for(predicate, WAIT)
            .await
            .unwrap_or_else(|| panic!("Timed out; last snapshot: {:?}", self.handle.snapshot()))
    }

    pub fn history(&self) -> Vec<Message> {
        self.handle.snapshot().session.history
    }
}

pub struct TestWidgetBuilder {
    config: WidgetConfig,
    remote_tree: Option<DecisionTree>,
    store: Arc<MemoryStore>,
    transport: Arc<MockChatTransport>,
    actions: ActionRegistry,
    renderer: Option<Arc<dyn CustomRenderer>>,
}

#[allow(dead_code)]
impl TestWidgetBuilder {
    pub fn new() -> Self {
        Self {
            config: WidgetConfig {
                update_interval_ms: 0,
                ..WidgetConfig::default()
            },
            remote_tree: None,
            store: Arc::new(MemoryStore::new()),
            transport: Arc::new(MockChatTransport::new()),
            actions: ActionRegistry::new(),
            renderer: None,
        }
    }

    /// Tree served by the mock remote source
    pub fn tree(mut self, tree: DecisionTree) -> Self {
        self.remote_tree = Some(tree);
        self
    }

    /// Tree supplied inline, without a remote source
    pub fn static_tree(mut self, tree: DecisionTree) -> Self {
        self.config.initial_tree = Some(tree);
        self
    }

    pub fn poll_every(mut self, ms: i64) -> Self {
        self.config.update_interval_ms = ms;
        self
    }

    /// Point sync at the mock chat backend
    pub fn chat_enabled(mut self) -> Self {
        self.config.chat_api_base_url = "http://chat.test".to_string();
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut WidgetConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn transport(mut self, transport: Arc<MockChatTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn action(mut self, name: &str, handler: Arc<dyn ActionHandler>) -> Self {
        self.actions.register(name, handler);
        self
    }

    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn CustomRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> TestWidget {
        let trees = Arc::new(MockTreeSource::new(self.remote_tree.clone()));
        let presenter = Arc::new(RecordingPresenter::new());
        let source = self.remote_tree.is_some().then(|| Arc::clone(&trees));

        let (mut runtime, handle) = WidgetRuntime::new(
            &self.config,
            Arc::clone(&self.store),
            source,
            Arc::clone(&self.transport),
            Arc::clone(&presenter),
            self.actions,
        );
        if let Some(renderer) = self.renderer {
            runtime = runtime.with_renderer(renderer);
        }

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestWidget {
            handle,
            store: self.store,
            trees,
            transport: self.transport,
            presenter,
            _runtime_handle: runtime_handle,
        }
    }
}

impl Default for TestWidgetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionContext, ActionError};
    use crate::presenter::AddMessage;
    use crate::store::{KeyValueStore, SessionStore};
    use crate::tree::{DecisionOption, Node, END_NODE};
    use futures::FutureExt;

    fn node(message: &str, options: Vec<DecisionOption>) -> Node {
        Node {
            message: message.to_string(),
            options,
        }
    }

    /// start --Go--> done, plus an action option
    fn go_tree() -> DecisionTree {
        DecisionTree::new()
            .with_node(
                "start",
                node(
                    "Hi",
                    vec![
                        DecisionOption::goto("Go", "done"),
                        DecisionOption::run("Notify", "notify"),
                    ],
                ),
            )
            .with_node("done", node("Bye", vec![]))
    }

    fn failing(message: &'static str) -> Arc<dyn ActionHandler> {
        struct Failing(&'static str);

        #[async_trait]
        impl ActionHandler for Failing {
            async fn invoke(&self, _ctx: ActionContext) -> Result<(), ActionError> {
                Err(ActionError::new(self.0))
            }
        }

        Arc::new(Failing(message))
    }

    fn panicking() -> Arc<dyn ActionHandler> {
        struct Panicking;

        #[async_trait]
        impl ActionHandler for Panicking {
            async fn invoke(&self, _ctx: ActionContext) -> Result<(), ActionError> {
                panic!("handler exploded")
            }
        }

        Arc::new(Panicking)
    }

    #[tokio::test]
    async fn test_go_moves_to_done() {
        let widget = TestWidget::builder().tree(go_tree()).build();
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        let snapshot = widget.wait_for(|s| s.session.current_node == "done").await;

        assert_eq!(
            snapshot.session.history,
            vec![Message::user("Go"), Message::bot("Bye")]
        );
        assert!(snapshot.options.is_empty());
        // Closed panel: nothing rendered
        assert_eq!(widget.presenter.message_renders(), 0);
    }

    #[tokio::test]
    async fn test_failing_action_still_ends() {
        let widget = TestWidget::builder()
            .tree(go_tree())
            .action("notify", failing("boom"))
            .build();
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::run("Notify", "notify"))
            .unwrap();
        let snapshot = widget.wait_for(|s| s.session.current_node == END_NODE).await;

        assert_eq!(
            snapshot.session.history,
            vec![Message::user("Notify"), Message::bot("Listo.")]
        );
    }

    #[tokio::test]
    async fn test_panicking_action_still_ends() {
        let tree = go_tree().with_node(END_NODE, node("Thanks", vec![]));
        let widget = TestWidget::builder()
            .tree(tree)
            .action("notify", panicking())
            .build();
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::run("Notify", "notify"))
            .unwrap();
        let snapshot = widget.wait_for(|s| s.session.current_node == END_NODE).await;
        assert_eq!(
            snapshot.session.history.last(),
            Some(&Message::bot("Thanks"))
        );
    }

    #[tokio::test]
    async fn test_action_sees_selection_context() {
        let seen = Arc::new(Mutex::new(None));
        let mut actions = ActionRegistry::new();
        actions.register_fn("notify", {
            let seen = Arc::clone(&seen);
            move |ctx: ActionContext| {
                *seen.lock().unwrap() = Some((ctx.current_node.clone(), ctx.tree.is_some()));
                async { Ok::<(), ActionError>(()) }.boxed()
            }
        });
        let widget = TestWidget::builder().tree(go_tree()).actions(actions).build();
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::run("Notify", "notify"))
            .unwrap();
        widget.wait_for(|s| s.session.current_node == END_NODE).await;
        assert_eq!(*seen.lock().unwrap(), Some(("start".to_string(), true)));
    }

    #[tokio::test]
    async fn test_identical_polls_do_not_fire() {
        let widget = TestWidget::builder().tree(go_tree()).poll_every(10).build();
        widget.ready().await;
        widget.handle.open().unwrap();
        widget.wait_for(|s| !s.session.history.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let renders = widget.presenter.calls().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(widget.trees.fetches() > 2);
        assert_eq!(widget.presenter.calls().len(), renders);

        // A real change lands
        widget
            .trees
            .set_tree(Some(DecisionTree::new().with_node("start", node("New hi", vec![]))));
        let snapshot = widget.wait_for(|s| s.options.is_empty()).await;
        assert_eq!(snapshot.session.current_node, "start");
        assert!(widget.presenter.calls().len() > renders);
    }

    #[tokio::test]
    async fn test_boot_failure_recovered_by_polling() {
        let widget = TestWidget::builder().tree(go_tree()).poll_every(10).build();
        widget.trees.set_tree(None);
        let snapshot = widget.ready().await;
        assert!(!snapshot.has_tree);

        widget.trees.set_tree(Some(go_tree()));
        let snapshot = widget.wait_for(|s| s.has_tree).await;
        assert_eq!(snapshot.options.len(), 2);
    }

    #[tokio::test]
    async fn test_option_without_tree_is_ignored() {
        let widget = TestWidget::builder().build();
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        widget.handle.submit_text("still here").unwrap();
        let snapshot = widget.wait_for(|s| !s.session.history.is_empty()).await;
        assert_eq!(snapshot.session.history, vec![Message::user("still here")]);
    }

    #[tokio::test]
    async fn test_no_network_without_chat_base_url() {
        let widget = TestWidget::builder().static_tree(go_tree()).build();
        widget.ready().await;

        widget.handle.open().unwrap();
        widget
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        widget.handle.submit_text("hello").unwrap();
        widget
            .wait_for(|s| s.session.history.last() == Some(&Message::user("hello")))
            .await;

        assert_eq!(widget.transport.get_calls(), 0);
        assert!(widget.transport.posted().is_empty());
        assert!(widget.presenter.sending_changes().is_empty());
    }

    #[tokio::test]
    async fn test_greeting_seeded_once_without_server_history() {
        let widget = TestWidget::builder().static_tree(go_tree()).build();
        widget.ready().await;

        widget.handle.open().unwrap();
        widget.wait_for(|s| !s.session.history.is_empty()).await;
        widget.handle.close().unwrap();
        widget.handle.open().unwrap();
        widget
            .wait_for(|s| s.is_open && widget.presenter.message_renders() >= 4)
            .await;

        assert_eq!(widget.history(), vec![Message::bot("Hi")]);
    }

    #[tokio::test]
    async fn test_no_duplicate_greeting_with_server_history() {
        let transport = Arc::new(MockChatTransport::new());
        let server = vec![Message::bot("Hi"), Message::user("Go"), Message::bot("Bye")];
        transport.set_history(ServerHistory {
            messages: server.clone(),
            current_node: Some("done".to_string()),
        });
        let widget = TestWidget::builder()
            .tree(go_tree())
            .chat_enabled()
            .transport(transport)
            .build();
        widget.ready().await;

        widget.handle.open().unwrap();
        let snapshot = widget.wait_for(|s| s.session.history.len() == 3).await;

        assert_eq!(snapshot.session.history, server);
        assert_eq!(snapshot.session.current_node, "done");
        let greetings = snapshot
            .session
            .history
            .iter()
            .filter(|m| m.text == "Hi")
            .count();
        assert_eq!(greetings, 1);
    }

    #[tokio::test]
    async fn test_history_fetch_failure_falls_back_to_greeting() {
        let widget = TestWidget::builder().tree(go_tree()).chat_enabled().build();
        widget.transport.fail_gets(true);
        widget.ready().await;

        widget.handle.open().unwrap();
        let snapshot = widget.wait_for(|s| !s.session.history.is_empty()).await;
        assert_eq!(snapshot.session.history, vec![Message::bot("Hi")]);
        assert_eq!(widget.transport.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_sync_mirrors_selection() {
        let widget = TestWidget::builder().tree(go_tree()).chat_enabled().build();
        let booted = widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        widget
            .wait_for(|s| {
                widget.transport.posted().len() == 2 && s.session.history.len() == 2 && !s.sending
            })
            .await;

        let posted = widget.transport.posted();
        assert_eq!(posted.len(), 2);
        assert!(posted.iter().all(|p| p.thread_id == booted.session_id));

        let option_post = posted.iter().find(|p| p.text == "Go").unwrap();
        assert_eq!(
            option_post.meta,
            MessageMeta::DecisionOption {
                current_node: "start".to_string(),
                option: DecisionOption::goto("Go", "done"),
            }
        );
        let bot_post = posted.iter().find(|p| p.text == "Bye").unwrap();
        assert_eq!(
            bot_post.meta,
            MessageMeta::BotMessage {
                node: "done".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_late_history_refresh_does_not_roll_back_transcript() {
        let widget = TestWidget::builder().tree(go_tree()).chat_enabled().build();
        widget.transport.slow_first_get(Duration::from_millis(300));
        widget.ready().await;

        widget
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        widget
            .wait_for(|s| {
                widget.transport.get_calls() == 2
                    && s.session.history == vec![Message::user("Go"), Message::bot("Bye")]
            })
            .await;

        // The first refresh still holds the one-message transcript
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = widget.wait_for(|s| !s.sending).await;

        assert_eq!(
            snapshot.session.history,
            vec![Message::user("Go"), Message::bot("Bye")]
        );
        assert_eq!(snapshot.session.current_node, "done");
        let stored = SessionStore::new(Arc::clone(&widget.store), "decision-chat", "start")
            .load()
            .unwrap();
        assert_eq!(stored.history, snapshot.session.history);
    }

    #[tokio::test]
    async fn test_send_failure_shows_inline_message() {
        let widget = TestWidget::builder().tree(go_tree()).chat_enabled().build();
        widget.transport.fail_posts(true);
        widget.ready().await;

        widget.handle.submit_text("  hello  ").unwrap();
        let failure = WidgetConfig::default().send_failure_message;
        let snapshot = widget
            .wait_for(|s| s.session.history.last() == Some(&Message::bot(failure.as_str())))
            .await;

        assert_eq!(
            snapshot.session.history,
            vec![Message::user("hello"), Message::bot(failure.as_str())]
        );
        let snapshot = widget
            .wait_for(|_| widget.presenter.sending_changes().last() == Some(&false))
            .await;
        assert!(!snapshot.sending);
        assert_eq!(widget.transport.posted().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_ignored() {
        let widget = TestWidget::builder().static_tree(go_tree()).build();
        widget.ready().await;

        widget.handle.submit_text("   ").unwrap();
        widget.handle.submit_text("real").unwrap();
        let snapshot = widget.wait_for(|s| !s.session.history.is_empty()).await;
        assert_eq!(snapshot.session.history, vec![Message::user("real")]);
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let first = TestWidget::builder()
            .tree(go_tree())
            .store(Arc::clone(&store))
            .build();
        let booted = first.ready().await;
        first
            .handle
            .select_option(DecisionOption::goto("Go", "done"))
            .unwrap();
        let before = first.wait_for(|s| s.session.current_node == "done").await;
        first.handle.shutdown();

        let second = TestWidget::builder().tree(go_tree()).store(store).build();
        let after = second.ready().await;

        assert_eq!(after.session, before.session);
        assert_eq!(after.session_id, booted.session_id);
        assert!(!after.is_open);
    }

    #[tokio::test]
    async fn test_stale_node_reset_on_boot() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "decision-chat:state",
                r#"{"currentNode": "gone", "history": [{"text": "old", "from": "bot"}]}"#,
            )
            .unwrap();
        let widget = TestWidget::builder().tree(go_tree()).store(store).build();
        let snapshot = widget.ready().await;

        assert_eq!(snapshot.session.current_node, "start");
        assert_eq!(snapshot.session.history, vec![Message::bot("old")]);
    }

    #[tokio::test]
    async fn test_explicit_thread_id_wins() {
        let widget = TestWidget::builder()
            .configure(|c| c.thread_id = Some("host-thread".to_string()))
            .build();
        assert_eq!(widget.ready().await.session_id, "host-thread");
    }

    #[tokio::test]
    async fn test_custom_renderer_replaces_transcript_rendering() {
        let added = Arc::new(AtomicBool::new(false));
        let renders = Arc::new(AtomicUsize::new(0));
        let renderer: Arc<dyn CustomRenderer> = Arc::new({
            let added = Arc::clone(&added);
            let renders = Arc::clone(&renders);
            move |_view: &WidgetView<'_>, add: &AddMessage| {
                renders.fetch_add(1, Ordering::SeqCst);
                if !added.swap(true, Ordering::SeqCst) {
                    add.bot("from renderer");
                }
            }
        });
        let widget = TestWidget::builder()
            .static_tree(go_tree())
            .renderer(renderer)
            .build();
        widget.ready().await;

        widget.handle.open().unwrap();
        widget
            .wait_for(|s| s.session.history.contains(&Message::bot("from renderer")))
            .await;

        assert!(renders.load(Ordering::SeqCst) >= 1);
        assert_eq!(widget.presenter.message_renders(), 0);
        assert!(widget
            .presenter
            .calls()
            .iter()
            .any(|c| matches!(c, PresenterCall::Options(_))));
    }

    #[tokio::test]
    async fn test_shutdown_stops_runtime() {
        let widget = TestWidget::builder().tree(go_tree()).poll_every(10).build();
        widget.ready().await;
        widget.handle.shutdown();

        tokio::time::timeout(WAIT, async {
            while !widget.handle.is_stopped() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(widget.handle.open().is_err());
    }
}
