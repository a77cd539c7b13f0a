//! Background coordination
//!
//! Collapses bursts of search requests so that only the trailing one runs.

mod debounce;

pub use debounce::{Debouncer, Quiet};
