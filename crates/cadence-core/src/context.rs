//! Request-scoped context propagation.
//!
//! Every chat request runs inside a [`RequestScope`] carrying the user id,
//! the usage callbacks, the active agent label and optional environment
//! mocks. Code anywhere below the handler reads these values through the
//! free functions in this module instead of threading them through every
//! signature.
//!
//! Storage is a tokio task-local frame while inside a scope and a
//! thread-local frame otherwise (CLI, sync code, tests). Work handed to
//! other tasks or blocking threads keeps the parent's values when started
//! through [`spawn_scoped`] / [`spawn_blocking_scoped`]; the child runs on a
//! copy, so nothing it changes leaks back.
//!
//! `set_*` returns a [`ContextToken`] holding the prior value and the frame
//! it was taken from. [`reset`] restores that value only when called against
//! the same frame; a token that escaped its scope resets nothing. None of
//! these operations panic.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;

use cadence_types::environment::EnvMocks;
use cadence_types::user::UserId;

use crate::usage::ModelCallback;

/// Agent label used when none has been set.
pub const DEFAULT_AGENT_LABEL: &str = "main_agent";

/// Frame ids start at 1; 0 marks a token that was never attached to a frame.
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Default)]
struct ContextValues {
    user_id: Option<UserId>,
    callbacks: Vec<Arc<dyn ModelCallback>>,
    agent_label: Option<String>,
    env_mocks: Option<EnvMocks>,
}

struct Frame {
    id: u64,
    values: ContextValues,
}

impl Frame {
    fn new(values: ContextValues) -> Self {
        Self {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            values,
        }
    }
}

tokio::task_local! {
    static TASK_FRAME: RefCell<Frame>;
}

thread_local! {
    static THREAD_FRAME: RefCell<Frame> = RefCell::new(Frame::new(ContextValues::default()));
}

/// Run `f` against the innermost frame: the task-local one when inside a
/// scope, else this thread's. Returns `None` if the frame is unavailable.
fn with_frame<R>(f: impl FnOnce(&mut Frame) -> R) -> Option<R> {
    if TASK_FRAME.try_with(|_| ()).is_ok() {
        TASK_FRAME
            .try_with(|cell| cell.try_borrow_mut().ok().map(|mut frame| f(&mut *frame)))
            .ok()
            .flatten()
    } else {
        THREAD_FRAME
            .try_with(|cell| cell.try_borrow_mut().ok().map(|mut frame| f(&mut *frame)))
            .ok()
            .flatten()
    }
}

enum Previous {
    UserId(Option<UserId>),
    Callbacks(Vec<Arc<dyn ModelCallback>>),
    AgentLabel(Option<String>),
    EnvMocks(Option<EnvMocks>),
    Detached,
}

/// Prior value of one context slot, restorable with [`reset`].
#[must_use = "pass the token to context::reset to restore the previous value"]
pub struct ContextToken {
    frame_id: u64,
    previous: Previous,
}

impl ContextToken {
    fn detached() -> Self {
        Self {
            frame_id: 0,
            previous: Previous::Detached,
        }
    }
}

fn swap(f: impl FnOnce(&mut ContextValues) -> Previous) -> ContextToken {
    with_frame(|frame| ContextToken {
        frame_id: frame.id,
        previous: f(&mut frame.values),
    })
    .unwrap_or_else(ContextToken::detached)
}

/// Set the current user. `None` makes downstream lookups unscoped.
pub fn set_user_id(user_id: Option<UserId>) -> ContextToken {
    swap(|values| Previous::UserId(std::mem::replace(&mut values.user_id, user_id)))
}

/// Replace the usage callbacks notified after each model call.
pub fn set_callbacks(callbacks: Vec<Arc<dyn ModelCallback>>) -> ContextToken {
    swap(|values| Previous::Callbacks(std::mem::replace(&mut values.callbacks, callbacks)))
}

/// Set the label stamped on usage entries. `None` falls back to `main_agent`.
pub fn set_agent_label(label: Option<String>) -> ContextToken {
    swap(|values| Previous::AgentLabel(std::mem::replace(&mut values.agent_label, label)))
}

/// Install (or clear) the environment mocks.
pub fn set_env_mocks(mocks: Option<EnvMocks>) -> ContextToken {
    swap(|values| Previous::EnvMocks(std::mem::replace(&mut values.env_mocks, mocks)))
}

/// Restore the value captured by `token`.
///
/// No-op when the token belongs to a different frame than the current one.
pub fn reset(token: ContextToken) {
    let ContextToken { frame_id, previous } = token;
    with_frame(move |frame| {
        if frame.id != frame_id {
            tracing::trace!(
                token_frame = frame_id,
                current_frame = frame.id,
                "Ignoring context reset from another scope"
            );
            return;
        }
        let values = &mut frame.values;
        match previous {
            Previous::UserId(v) => values.user_id = v,
            Previous::Callbacks(v) => values.callbacks = v,
            Previous::AgentLabel(v) => values.agent_label = v,
            Previous::EnvMocks(v) => values.env_mocks = v,
            Previous::Detached => {}
        }
    });
}

/// Current user, if the request is authenticated.
pub fn current_user_id() -> Option<UserId> {
    with_frame(|frame| frame.values.user_id).flatten()
}

/// Callbacks registered for the current request (empty when none).
pub fn current_callbacks() -> Vec<Arc<dyn ModelCallback>> {
    with_frame(|frame| frame.values.callbacks.clone()).unwrap_or_default()
}

/// Label of the agent currently making model calls.
pub fn current_agent_label() -> String {
    with_frame(|frame| frame.values.agent_label.clone())
        .flatten()
        .unwrap_or_else(|| DEFAULT_AGENT_LABEL.to_string())
}

/// Environment mocks for the current request, if any.
pub fn current_env_mocks() -> Option<EnvMocks> {
    with_frame(|frame| frame.values.env_mocks.clone()).flatten()
}

/// Resets its token when dropped, so the restore also happens on early
/// returns and cancellation.
pub struct ContextGuard {
    token: Option<ContextToken>,
}

impl ContextGuard {
    pub fn new(token: ContextToken) -> Self {
        Self { token: Some(token) }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            reset(token);
        }
    }
}

/// Run `future` with the agent label set to `label`, restoring the outer
/// label afterwards.
pub async fn with_agent_label<F: Future>(label: &str, future: F) -> F::Output {
    let _guard = ContextGuard::new(set_agent_label(Some(label.to_string())));
    future.await
}

/// A set of context values that can be entered by a future or closure.
#[derive(Clone, Default)]
pub struct RequestScope {
    values: ContextValues,
}

impl RequestScope {
    /// An empty scope: no user, no callbacks, default label, no mocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the values visible at the call site.
    pub fn capture() -> Self {
        Self {
            values: with_frame(|frame| frame.values.clone()).unwrap_or_default(),
        }
    }

    pub fn with_user_id(mut self, user_id: Option<UserId>) -> Self {
        self.values.user_id = user_id;
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ModelCallback>) -> Self {
        self.values.callbacks.push(callback);
        self
    }

    pub fn with_agent_label(mut self, label: impl Into<String>) -> Self {
        self.values.agent_label = Some(label.into());
        self
    }

    pub fn with_env_mocks(mut self, mocks: Option<EnvMocks>) -> Self {
        self.values.env_mocks = mocks;
        self
    }

    /// Drive `future` inside a fresh task-local frame holding these values.
    pub async fn run<F: Future>(self, future: F) -> F::Output {
        TASK_FRAME
            .scope(RefCell::new(Frame::new(self.values)), future)
            .await
    }

    /// Synchronous counterpart of [`RequestScope::run`].
    pub fn run_sync<R>(self, f: impl FnOnce() -> R) -> R {
        TASK_FRAME.sync_scope(RefCell::new(Frame::new(self.values)), f)
    }
}

/// `tokio::spawn` that carries the caller's context into the new task.
pub fn spawn_scoped<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let scope = RequestScope::capture();
    tokio::spawn(scope.run(future))
}

/// `spawn_blocking` that carries the caller's context onto the blocking thread.
pub fn spawn_blocking_scoped<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let scope = RequestScope::capture();
    tokio::task::spawn_blocking(move || scope.run_sync(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::llm::{InvocationParams, RawCompletion};

    struct NoopCallback;

    impl ModelCallback for NoopCallback {
        fn on_model_end(&self, _completion: &RawCompletion, _invocation: &InvocationParams) {}
    }

    #[test]
    fn test_defaults_outside_any_scope() {
        assert_eq!(current_user_id(), None);
        assert!(current_callbacks().is_empty());
        assert_eq!(current_agent_label(), DEFAULT_AGENT_LABEL);
        assert_eq!(current_env_mocks(), None);
    }

    #[test]
    fn test_thread_fallback_set_and_reset() {
        let token = set_user_id(Some(UserId(5)));
        assert_eq!(current_user_id(), Some(UserId(5)));
        reset(token);
        assert_eq!(current_user_id(), None);
    }

    #[test]
    fn test_nested_labels_restore_in_order() {
        let outer = set_agent_label(Some("outer".to_string()));
        let inner = set_agent_label(Some("context_agent".to_string()));
        assert_eq!(current_agent_label(), "context_agent");
        reset(inner);
        assert_eq!(current_agent_label(), "outer");
        reset(outer);
        assert_eq!(current_agent_label(), DEFAULT_AGENT_LABEL);
    }

    #[tokio::test]
    async fn test_scope_values_visible_inside_run() {
        let scope = RequestScope::new()
            .with_user_id(Some(UserId(1)))
            .with_callback(Arc::new(NoopCallback));

        scope
            .run(async {
                assert_eq!(current_user_id(), Some(UserId(1)));
                assert_eq!(current_callbacks().len(), 1);
                assert_eq!(current_agent_label(), DEFAULT_AGENT_LABEL);
            })
            .await;

        assert_eq!(current_user_id(), None);
    }

    #[tokio::test]
    async fn test_spawned_task_inherits_without_leaking_back() {
        RequestScope::new()
            .with_user_id(Some(UserId(42)))
            .run(async {
                let child = spawn_scoped(async {
                    let seen = current_user_id();
                    let token = set_agent_label(Some("context_agent".to_string()));
                    let label = current_agent_label();
                    reset(token);
                    let _leak = set_user_id(Some(UserId(99)));
                    (seen, label)
                });
                let (seen, label) = child.await.unwrap();
                assert_eq!(seen, Some(UserId(42)));
                assert_eq!(label, "context_agent");
                assert_eq!(current_user_id(), Some(UserId(42)));
                assert_eq!(current_agent_label(), DEFAULT_AGENT_LABEL);
            })
            .await;
    }

    #[tokio::test]
    async fn test_blocking_thread_inherits_context() {
        let seen = RequestScope::new()
            .with_user_id(Some(UserId(7)))
            .with_env_mocks(Some(EnvMocks {
                weather: Some("nublado".to_string()),
                ..Default::default()
            }))
            .run(async {
                spawn_blocking_scoped(|| (current_user_id(), current_env_mocks()))
                    .await
                    .unwrap()
            })
            .await;

        assert_eq!(seen.0, Some(UserId(7)));
        assert_eq!(seen.1.and_then(|m| m.weather).as_deref(), Some("nublado"));
    }

    #[tokio::test]
    async fn test_token_reset_outside_its_scope_is_noop() {
        let escaped = RequestScope::new()
            .run(async { set_user_id(Some(UserId(3))) })
            .await;

        let outer = set_user_id(Some(UserId(10)));
        reset(escaped);
        assert_eq!(current_user_id(), Some(UserId(10)));
        reset(outer);
        assert_eq!(current_user_id(), None);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let mut handles = Vec::new();
        for id in 1..=8 {
            handles.push(tokio::spawn(
                RequestScope::new()
                    .with_user_id(Some(UserId(id)))
                    .run(async move {
                        tokio::task::yield_now().await;
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        current_user_id() == Some(UserId(id))
                    }),
            ));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_with_agent_label_restores_after_await() {
        RequestScope::new()
            .run(async {
                let inner = with_agent_label("context_agent", async {
                    tokio::task::yield_now().await;
                    current_agent_label()
                })
                .await;
                assert_eq!(inner, "context_agent");
                assert_eq!(current_agent_label(), DEFAULT_AGENT_LABEL);
            })
            .await;
    }
}
