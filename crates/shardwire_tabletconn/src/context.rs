//! Cancellation and deadline carried into every tablet call.

use crate::error::{TabletError, TabletResult};
use parking_lot::Mutex;
use shardwire_types::CallerId;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancelState>>>,
}

impl CancelState {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Execution context for tablet calls.
///
/// Clones share one cancellation flag. [`Context::child`] creates a context
/// that is cancelled with its parent but can also be cancelled on its own.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use shardwire_tabletconn::{Context, TabletError};
/// use std::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_millis(10));
/// let res: Result<(), _> = ctx
///     .run(async {
///         tokio::time::sleep(Duration::from_secs(5)).await;
///         Ok(())
///     })
///     .await;
/// assert_eq!(res, Err(TabletError::DeadlineExceeded));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Arc<CancelState>,
    deadline: Option<Instant>,
    caller_id: Option<CallerId>,
}

impl Context {
    /// Returns a context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a copy whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy whose deadline is at most `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Returns a copy carrying the caller identity.
    pub fn with_caller_id(&self, caller_id: CallerId) -> Self {
        Self {
            caller_id: Some(caller_id),
            ..self.clone()
        }
    }

    /// Returns a context cancelled whenever this one is.
    pub fn child(&self) -> Self {
        let state = Arc::new(CancelState::default());
        {
            let mut children = self.cancel.children.lock();
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&state));
        }
        if self.cancel.is_cancelled() {
            state.cancel();
        }
        Self {
            cancel: state,
            deadline: self.deadline,
            caller_id: self.caller_id.clone(),
        }
    }

    /// Cancels this context, its clones and its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the caller identity, if any.
    pub fn caller_id(&self) -> Option<&CallerId> {
        self.caller_id.as_ref()
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> TabletResult<()> {
        if self.is_cancelled() {
            return Err(TabletError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(TabletError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Runs `fut` unless the context ends first.
    ///
    /// The context is checked before `fut` is polled and then raced against
    /// it; `fut` is dropped as soon as the context is cancelled or expires.
    pub async fn run<F, T>(&self, fut: F) -> TabletResult<T>
    where
        F: Future<Output = TabletResult<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TabletError::Cancelled),
            _ = sleep_until(self.deadline) => Err(TabletError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
