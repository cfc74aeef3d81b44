//! Calibration chart definitions
//!
//! This module describes the physical charts the engine can judge:
//! patch layout, reference colors and tolerances, plus a renderer that
//! draws a chart into an image under a given placement.

pub mod builtin;
pub mod render;
pub mod spec;

pub use render::{render_chart, ChartPlacement, RenderOptions};
pub use spec::{
    ChartDefinition, ChartSpec, GridLayout, LabColor, NormalizedRect, PatchDefinition, PatchSpec,
    Reference,
};
