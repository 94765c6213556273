mod heap;
mod index;

// region:    --- Exports
pub use heap::Heap;
// endregion: --- Exports
