use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::ContainerFs;

/// The single container runtime of one workspace session.
///
/// Passed explicitly to whoever needs the container filesystem. The
/// filesystem is only reachable between [`boot`](Self::boot) and
/// [`teardown`](Self::teardown); callers must check before every pass.
#[derive(Default)]
pub struct ContainerContext {
    fs: RwLock<Option<Arc<dyn ContainerFs>>>,
}

impl fmt::Debug for ContainerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerContext")
            .field("booted", &self.is_booted())
            .finish()
    }
}

impl ContainerContext {
    /// Create a context whose container has not booted yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that is already booted with `fs`.
    #[must_use]
    pub fn booted(fs: Arc<dyn ContainerFs>) -> Self {
        Self {
            fs: RwLock::new(Some(fs)),
        }
    }

    /// Mark the container as booted and expose its filesystem.
    pub fn boot(&self, fs: Arc<dyn ContainerFs>) {
        if let Ok(mut slot) = self.fs.write() {
            *slot = Some(fs);
            info!("container booted");
        }
    }

    /// Drop the container filesystem reference.
    pub fn teardown(&self) {
        if let Ok(mut slot) = self.fs.write() {
            if slot.take().is_some() {
                info!("container torn down");
            }
        }
    }

    /// True once [`boot`](Self::boot) has been called and not torn down.
    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.fs.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// The container filesystem, if the container is booted.
    #[must_use]
    pub fn file_system(&self) -> Option<Arc<dyn ContainerFs>> {
        self.fs.read().ok().and_then(|slot| slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFs;

    #[test]
    fn test_boot_lifecycle() {
        let ctx = ContainerContext::new();
        assert!(!ctx.is_booted());
        assert!(ctx.file_system().is_none());

        ctx.boot(Arc::new(MemoryFs::new()));
        assert!(ctx.is_booted());
        assert!(ctx.file_system().is_some());

        ctx.teardown();
        assert!(!ctx.is_booted());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let a = ContainerContext::booted(Arc::new(MemoryFs::new()));
        let b = ContainerContext::new();
        assert!(a.is_booted());
        assert!(!b.is_booted());
    }
}
