use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// A transport context shared by a control channel and the streaming
/// channels it spawned.
///
/// Every connected channel holds a [`ContextLease`]. The underlying context
/// is terminated exactly once, when the last outstanding lease is released,
/// so no socket can outlive the context it was created from.
pub struct SharedContext<T: Transport> {
    inner: Arc<ContextInner<T>>,
}

struct ContextInner<T: Transport> {
    transport: T,
    leases: Mutex<usize>,
    terminated: AtomicBool,
}

impl<T: Transport> SharedContext<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                transport,
                leases: Mutex::new(0),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// Take a new lease on the context.
    ///
    /// Fails with [`TransportError::ContextTerminated`] once the last lease
    /// has been released.
    pub fn lease(&self) -> Result<ContextLease<T>> {
        let mut leases = self
            .inner
            .leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.terminated.load(Ordering::Acquire) {
            return Err(TransportError::ContextTerminated);
        }
        *leases += 1;
        debug!(leases = *leases, "context lease acquired");
        Ok(ContextLease {
            inner: Some(Arc::clone(&self.inner)),
        })
    }

    /// Number of leases currently held.
    pub fn active_leases(&self) -> usize {
        *self
            .inner
            .leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport> Clone for SharedContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SharedContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedContext")
            .field("transport", &self.inner.transport.transport_name())
            .field("leases", &self.active_leases())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// One channel's share of a [`SharedContext`].
///
/// Released explicitly with [`ContextLease::release`] or on drop.
pub struct ContextLease<T: Transport> {
    inner: Option<Arc<ContextInner<T>>>,
}

impl<T: Transport> ContextLease<T> {
    /// The leased transport, or `None` after release.
    pub fn transport(&self) -> Option<&T> {
        self.inner.as_ref().map(|inner| &inner.transport)
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Give the lease back. Terminates the context if this was the last one.
    pub fn release(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };

        let mut leases = inner.leases.lock().unwrap_or_else(PoisonError::into_inner);
        *leases = leases.saturating_sub(1);
        debug!(leases = *leases, "context lease released");
        if *leases == 0 && !inner.terminated.swap(true, Ordering::AcqRel) {
            inner.transport.terminate();
            info!(
                transport = inner.transport.transport_name(),
                "transport context terminated"
            );
        }
    }
}

impl<T: Transport> Drop for ContextLease<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Transport> std::fmt::Debug for ContextLease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextLease")
            .field("released", &self.is_released())
            .finish()
    }
}
