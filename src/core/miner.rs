use crate::core::Block;
use crate::error::{BlockchainError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Handle to a block being mined on a background thread.
///
/// Cancelling stops the nonce search at its next check; nothing is
/// persisted for a cancelled attempt and [`wait`](Self::wait) returns
/// [`BlockchainError::MiningCancelled`].
pub struct MiningTask {
    handle: JoinHandle<Result<Block>>,
    cancel: Arc<AtomicBool>,
}

impl MiningTask {
    pub(crate) fn new(handle: JoinHandle<Result<Block>>, cancel: Arc<AtomicBool>) -> MiningTask {
        MiningTask { handle, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the attempt ends and hands back the stored block.
    pub fn wait(self) -> Result<Block> {
        self.handle
            .join()
            .map_err(|_| BlockchainError::Mining("Mining thread panicked".to_string()))?
    }
}
