//! Chart detection module
//!
//! This module handles locating a known chart in a photograph and the
//! projective geometry that maps chart coordinates to image pixels.

pub mod homography;
pub mod locator;

pub use homography::Homography;
pub use locator::{ChartInstance, ChartLocator};
