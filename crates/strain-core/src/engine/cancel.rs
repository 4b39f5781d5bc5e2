use super::error::EngineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag for best-effort early termination of a running analysis.
///
/// Clones share the same flag. The engine polls it between atoms and bonds;
/// a cancelled run returns [`EngineError::Cancelled`] and no partial result.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self, phase: &'static str) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}
