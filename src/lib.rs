//! Instanced 2D error-bar renderer built on wgpu.
//!
//! Renders large collections of error-bar glyphs (a bar plus optional end
//! caps on either axis) with a single instanced draw call per logical
//! group. Positions are kept in `f64` data coordinates and split into
//! f32 hi/lo pairs so placement stays accurate at deep zoom; updates are
//! diffed per group and the shared device buffers are only rebuilt when
//! the packed layout actually changed.
//!
//! # Architecture
//!
//! - [`split`]: f64 → f32 hi/lo coordinate splitting
//! - [`mesh`]: the fixed 36-vertex bar+caps template
//! - [`group`]: per-group state and the diff-style update pipeline
//! - [`pack`]: merging groups into contiguous device-ready buffers
//! - [`renderer`]: the wgpu pipeline and per-group draw recording
//! - [`batch`] / [`engine`]: request normalization and orchestration

pub mod batch;
pub mod color;
pub mod context;
pub mod engine;
pub mod group;
pub mod mesh;
pub mod pack;
pub mod renderer;
pub mod split;

pub use batch::{BatchState, DrawSelection, UpdateRequest};
pub use color::Color;
pub use context::{GraphicsContext, GraphicsContextDescriptor};
pub use engine::ErrorBars;
pub use group::{ColorSpec, GroupSpec, GroupState, Rect, UpdateError, ViewportSpec};
pub use mesh::{TEMPLATE, TEMPLATE_VERTEX_COUNT, TemplateVertex};
pub use pack::{PackedBuffers, pack};
pub use renderer::ErrorBarRenderer;
pub use split::split;
