//! A one-way latch for holding jobs mid-body.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Jobs `wait()` on the gate until the test calls `open()`.
///
/// Backed by a semaphore with no permits; opening closes it, which releases
/// every waiter.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Block until the gate is open.
    pub async fn wait(&self) {
        // Never holds permits; acquire only returns once the gate is closed
        let _ = self.permits.acquire().await;
    }

    /// Let every current and future waiter through.
    pub fn open(&self) {
        self.permits.close();
    }

    pub fn is_open(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
