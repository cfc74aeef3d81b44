//! Output module
//!
//! This module persists the analyzed image, optionally white balanced and
//! annotated with the judgment.

pub mod annotate;
pub mod writer;

pub use annotate::annotate;
pub use writer::{OutputWriter, WriteOutcome};
