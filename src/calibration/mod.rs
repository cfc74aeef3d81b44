//! White balance calibration module
//!
//! This module estimates a per-channel correction from the chart's neutral
//! patches and applies it to produce a color-corrected output image.

pub mod white_balance;

pub use white_balance::{WhiteBalance, WhiteBalanceEstimator};
