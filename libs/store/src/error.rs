use std::fmt::Debug;

use thiserror::Error;

/// Returned any time a [`crate::KeyFunc`] fails; carries the object at fault.
#[derive(Debug, Error)]
#[error("couldn't create key for object {obj:?}: {err}")]
pub struct KeyError<T: Debug> {
    pub obj: T,
    pub err: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum StoreError<T: Debug> {
    #[error(transparent)]
    Key(#[from] KeyError<T>),

    #[error("fifo: manipulating with closed queue")]
    FifoClosed,

    #[error("heap is closed")]
    HeapClosed,

    #[error("object not found")]
    NotFound,

    /// The ordered index yielded nothing although its key array was non-empty.
    #[error("object was removed from heap data")]
    Inconsistent,

    /// A pop callback failed. The popped item travels with the error so the
    /// caller still owns it.
    #[error("{err}")]
    Process { item: T, err: anyhow::Error },
}

impl<T: Debug> StoreError<T> {
    /// True for the shutdown signal of either queue.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::FifoClosed | Self::HeapClosed)
    }
}
