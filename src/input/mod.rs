//! Step Input Module
//!
//! Leaf components owned by a workflow while a time-boxed code step is active.
//!
//! # Components
//!
//! - [`CountdownTimer`]: decrementing clock with an expiry signal
//! - [`SegmentedCodeInput`]: fixed-length code cells with focus signals

pub mod code;
pub mod countdown;

pub use code::{CharClass, CodeBuffer, Edit, Focus, SegmentedCodeInput, DEFAULT_CODE_LENGTH};
pub use countdown::CountdownTimer;
