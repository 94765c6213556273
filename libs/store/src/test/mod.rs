//! Helpers shared by the queue crates' tests and by the stress tester.

pub mod stress;
