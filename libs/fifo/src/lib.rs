mod fifo;
mod requeue;

// region:    --- Exports
pub use fifo::Fifo;
pub use requeue::Requeue;
// endregion: --- Exports
