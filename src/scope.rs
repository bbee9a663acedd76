//! Cancellation scopes.
//!
//! A [`Scope`] is a cancellation signal with an optional deadline. Scopes form
//! a tree: cancelling a scope cancels every live scope derived from it, and a
//! derived scope never outlives its parent's deadline.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("scope cancelled")]
    Cancelled,
    #[error("scope deadline exceeded")]
    DeadlineExceeded,
}

struct ScopeInner {
    state: watch::Sender<Option<ScopeError>>,
    deadline: Option<Instant>,
    children: Mutex<Vec<Weak<ScopeInner>>>,
    // Keeps the ancestor chain alive for as long as any descendant lives, so
    // a dropped intermediate scope still relays cancellation.
    _parent: Option<Arc<ScopeInner>>,
}

impl ScopeInner {
    fn new(deadline: Option<Instant>, parent: Option<Arc<ScopeInner>>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            deadline,
            children: Mutex::new(Vec::new()),
            _parent: parent,
        }
    }

    fn cancel(&self, reason: ScopeError) {
        let children = {
            let mut children = self.children.lock();
            if self.state.borrow().is_some() {
                return;
            }
            self.state.send_replace(Some(reason));
            std::mem::take(&mut *children)
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason);
        }
    }
}

/// A cancellation signal with an optional deadline.
///
/// Cloning a `Scope` yields another handle to the same signal.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a root scope that ends only when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner::new(None, None)),
        }
    }

    /// Derives a scope that is cancelled together with `self`.
    pub fn child(&self) -> Scope {
        self.derive(self.inner.deadline)
    }

    /// Derives a scope that also ends once `timeout` has elapsed.
    pub fn with_timeout(&self, timeout: Duration) -> Scope {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derives a scope that also ends at `deadline`.
    ///
    /// The parent's deadline still applies if it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Scope {
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Scope {
        let child = Arc::new(ScopeInner::new(deadline, Some(Arc::clone(&self.inner))));

        let mut children = self.inner.children.lock();
        let parent_state = *self.inner.state.borrow();
        match parent_state {
            Some(reason) => {
                drop(children);
                child.cancel(reason);
            }
            None => {
                children.retain(|c| c.strong_count() > 0);
                children.push(Arc::downgrade(&child));
            }
        }

        Scope { inner: child }
    }

    /// Cancels this scope and every scope derived from it. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel(ScopeError::Cancelled);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns why the scope ended, or `None` while it is still live.
    pub fn error(&self) -> Option<ScopeError> {
        if let Some(reason) = *self.inner.state.borrow() {
            return Some(reason);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScopeError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error().is_some()
    }

    /// Waits until the scope is cancelled or its deadline passes, and
    /// returns the reason.
    pub async fn cancelled(&self) -> ScopeError {
        let mut state = self.inner.state.subscribe();
        let signalled = async {
            // The sender lives in `self.inner`, so the channel stays open.
            match state.wait_for(Option::is_some).await {
                Ok(reason) => reason.unwrap_or(ScopeError::Cancelled),
                Err(_) => ScopeError::Cancelled,
            }
        };

        match self.inner.deadline {
            Some(deadline) => tokio::select! {
                reason = signalled => reason,
                _ = tokio::time::sleep_until(deadline) => {
                    self.error().unwrap_or(ScopeError::DeadlineExceeded)
                }
            },
            None => signalled.await,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("deadline", &self.inner.deadline)
            .field("error", &self.error())
            .finish()
    }
}
