mod error;
mod job;
mod store;
pub mod test;

// region:    --- Exports
pub use error::{KeyError, StoreError};
pub use job::Job;
pub use store::{Comparator, Direction, KeyFunc, Queue, Store, derive_key};
// endregion: --- Exports
