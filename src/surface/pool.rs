//! Exclusive surface leasing.
//!
//! One sandbox serves one session at a time. The pool is an in-process
//! exclusivity registry, not a scheduler: acquiring a busy sandbox fails
//! immediately and the caller reports it as session-fatal. A lease frees its
//! slot exactly once, either through the consuming [`SurfaceLease::release`]
//! (which also tears down the remote lease) or, as a last resort, on drop.

use super::{HttpSurface, SurfaceHandle};
use crate::config::SurfaceConfig;
use crate::error::SurfaceError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry of sandboxes currently leased to sessions.
pub struct SurfacePool {
    config: SurfaceConfig,
    busy: Arc<Mutex<HashSet<String>>>,
}

impl SurfacePool {
    pub fn new(config: SurfaceConfig) -> Self {
        Self {
            config,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Lease `sandbox_id` exclusively.
    pub fn acquire(&self, sandbox_id: &str) -> Result<SurfaceLease, SurfaceError> {
        {
            let mut busy = lock_busy(&self.busy);
            if !busy.insert(sandbox_id.to_string()) {
                return Err(SurfaceError::Busy(sandbox_id.to_string()));
            }
        }

        let surface = HttpSurface::new(&self.config, sandbox_id);
        let handle = SurfaceHandle::new(Arc::new(surface));
        tracing::info!(sandbox = %sandbox_id, target = %handle.summary(), "surface leased");
        Ok(SurfaceLease {
            sandbox_id: sandbox_id.to_string(),
            handle,
            busy: Arc::clone(&self.busy),
            freed: false,
        })
    }

    /// Number of sandboxes currently leased.
    pub fn active_count(&self) -> usize {
        lock_busy(&self.busy).len()
    }
}

/// Exclusive lease on one sandbox for the lifetime of a session.
pub struct SurfaceLease {
    sandbox_id: String,
    handle: SurfaceHandle,
    busy: Arc<Mutex<HashSet<String>>>,
    freed: bool,
}

impl SurfaceLease {
    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    /// Cloneable handle shared with concurrently executing tool calls.
    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    /// Tear down the remote lease and free the slot. Remote failures are
    /// logged, not propagated: the slot must come free regardless.
    pub async fn release(mut self) {
        if let Err(err) = self.handle.release().await {
            tracing::warn!(
                sandbox = %self.sandbox_id,
                error = %err,
                "remote lease teardown failed"
            );
        }
        self.free_slot();
        tracing::info!(sandbox = %self.sandbox_id, "surface released");
    }

    fn free_slot(&mut self) {
        if self.freed {
            return;
        }
        self.freed = true;
        lock_busy(&self.busy).remove(&self.sandbox_id);
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        if !self.freed {
            tracing::warn!(
                sandbox = %self.sandbox_id,
                "lease dropped without release; freeing local slot only"
            );
            self.free_slot();
        }
    }
}

fn lock_busy(busy: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
