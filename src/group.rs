//! Per-group state and the diff-style update pipeline.
//!
//! Each error-bar group is one logical series: positions, per-point error
//! magnitudes, style, and its own data-to-viewport mapping. Updates arrive
//! as sparse [`GroupSpec`] records; [`GroupState::apply`] touches only the
//! fields present and recomputes derived fields in dependency order, so a
//! partial update never leaves the group inconsistent.

use crate::color::Color;
use crate::split;

/// A pixel rectangle, used both as the draw viewport and the scissor box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// The accepted viewport input shapes, normalized to [`Rect`] on apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportSpec {
    /// `[x0, y0, x1, y1]` corner form.
    Corners([f32; 4]),
    /// Edge form; width/height derived from the opposing edges.
    Edges {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
    /// Origin-plus-size form.
    Size {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl ViewportSpec {
    /// Normalize to an origin-plus-size rectangle.
    pub fn resolve(&self) -> Rect {
        match *self {
            Self::Corners([x0, y0, x1, y1]) => Rect::new(x0, y0, x1 - x0, y1 - y0),
            Self::Edges {
                left,
                top,
                right,
                bottom,
            } => Rect::new(left, top, right - left, bottom - top),
            Self::Size {
                x,
                y,
                width,
                height,
            } => Rect::new(x, y, width, height),
        }
    }
}

impl From<[f32; 4]> for ViewportSpec {
    fn from(corners: [f32; 4]) -> Self {
        Self::Corners(corners)
    }
}

impl From<Rect> for ViewportSpec {
    fn from(rect: Rect) -> Self {
        Self::Size {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Color input for a group: one color broadcast to every point, or one
/// color per point.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpec {
    Uniform(Color),
    PerPoint(Vec<Color>),
}

impl From<Color> for ColorSpec {
    fn from(c: Color) -> Self {
        Self::Uniform(c)
    }
}

impl From<Vec<Color>> for ColorSpec {
    fn from(cs: Vec<Color>) -> Self {
        Self::PerPoint(cs)
    }
}

/// Update failure.
///
/// Only color resolution is constraint-checked; other malformed numeric
/// input propagates into the buffers as NaN/Infinity and renders garbage
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// A per-point color array was shorter than the group's point count.
    InsufficientColorData { needed: usize, got: usize },
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientColorData { needed, got } => {
                write!(f, "Not enough colors: group has {} points, got {}", needed, got)
            }
        }
    }
}

impl std::error::Error for UpdateError {}

/// Side-effect hook invoked after a group is drawn.
pub type AfterHook = Box<dyn FnMut(&GroupState)>;

/// Sparse update description for one group.
///
/// Only fields that are `Some` are applied. Builder methods cover the
/// accepted aliases of each option (`width`/`line` for `line_width`,
/// `cap` for `cap_size`, `alpha` for `opacity`, and so on).
#[derive(Default)]
pub struct GroupSpec {
    pub positions: Option<Vec<f64>>,
    pub errors: Option<Vec<f32>>,
    pub color: Option<ColorSpec>,
    pub line_width: Option<f32>,
    pub cap_size: Option<f32>,
    pub opacity: Option<f32>,
    pub range: Option<[f64; 4]>,
    pub viewport: Option<ViewportSpec>,
    pub after: Option<AfterHook>,
}

impl GroupSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The construction-time defaults a fresh group starts from.
    pub(crate) fn defaults() -> Self {
        Self::new()
            .positions(Vec::new())
            .errors(Vec::new())
            .color(Color::BLACK)
            .cap_size(5.0)
            .line_width(1.0)
            .opacity(1.0)
    }

    /// Fill unset fields of `self` from `fallback`.
    pub(crate) fn or(mut self, fallback: Self) -> Self {
        self.positions = self.positions.or(fallback.positions);
        self.errors = self.errors.or(fallback.errors);
        self.color = self.color.or(fallback.color);
        self.line_width = self.line_width.or(fallback.line_width);
        self.cap_size = self.cap_size.or(fallback.cap_size);
        self.opacity = self.opacity.or(fallback.opacity);
        self.range = self.range.or(fallback.range);
        self.viewport = self.viewport.or(fallback.viewport);
        self.after = self.after.or(fallback.after);
        self
    }

    /// Flat interleaved `(x, y)` coordinates; source of truth for the count.
    pub fn positions(mut self, positions: Vec<f64>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Alias for [`positions`](Self::positions).
    pub fn position(self, positions: Vec<f64>) -> Self {
        self.positions(positions)
    }

    /// Alias for [`positions`](Self::positions).
    pub fn data(self, positions: Vec<f64>) -> Self {
        self.positions(positions)
    }

    /// Positions from 2D points.
    pub fn points(self, points: &[glam::DVec2]) -> Self {
        self.positions(points.iter().flat_map(|p| [p.x, p.y]).collect())
    }

    /// Four error magnitudes per point: `(negX, posX, negY, posY)`.
    pub fn errors(mut self, errors: Vec<f32>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Alias for [`errors`](Self::errors).
    pub fn error(self, errors: Vec<f32>) -> Self {
        self.errors(errors)
    }

    /// Group color, broadcast or per-point.
    pub fn color(mut self, color: impl Into<ColorSpec>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Alias for [`color`](Self::color).
    pub fn colors(self, colors: Vec<Color>) -> Self {
        self.color(colors)
    }

    /// Alias for [`color`](Self::color).
    pub fn fill(self, color: impl Into<ColorSpec>) -> Self {
        self.color(color)
    }

    /// Stroke width of bars and caps in pixels (pre-halving).
    pub fn line_width(mut self, width: f32) -> Self {
        self.line_width = Some(width);
        self
    }

    /// Alias for [`line_width`](Self::line_width).
    pub fn width(self, width: f32) -> Self {
        self.line_width(width)
    }

    /// Alias for [`line_width`](Self::line_width).
    pub fn line(self, width: f32) -> Self {
        self.line_width(width)
    }

    /// Cap half-length in pixels (pre-halving).
    pub fn cap_size(mut self, size: f32) -> Self {
        self.cap_size = Some(size);
        self
    }

    /// Alias for [`cap_size`](Self::cap_size).
    pub fn cap(self, size: f32) -> Self {
        self.cap_size(size)
    }

    /// Alpha multiplier applied at draw time, `0.0..=1.0`.
    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Alias for [`opacity`](Self::opacity).
    pub fn alpha(self, opacity: f32) -> Self {
        self.opacity(opacity)
    }

    /// Data-space rectangle `[minX, minY, maxX, maxY]` mapped to the unit
    /// viewport. Defaults to the data bounds when never set.
    pub fn range(mut self, range: [f64; 4]) -> Self {
        self.range = Some(range);
        self
    }

    /// Alias for [`range`](Self::range).
    pub fn data_box(self, range: [f64; 4]) -> Self {
        self.range(range)
    }

    /// Pixel rectangle the group draws into; also the scissor box.
    pub fn viewport(mut self, viewport: impl Into<ViewportSpec>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    /// Alias for [`viewport`](Self::viewport).
    pub fn view_box(self, viewport: impl Into<ViewportSpec>) -> Self {
        self.viewport(viewport)
    }

    /// Hook invoked with the group after each draw.
    pub fn after(mut self, hook: AfterHook) -> Self {
        self.after = Some(hook);
        self
    }
}

/// What an update changed, used by the engine to decide on repacking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyEffect {
    /// The point count changed; every later group's offset shifts.
    pub size_changed: bool,
    /// Packed buffer content (positions, errors, colors) changed.
    pub data_changed: bool,
}

impl ApplyEffect {
    pub fn merge(&mut self, other: ApplyEffect) {
        self.size_changed |= other.size_changed;
        self.data_changed |= other.data_changed;
    }
}

/// Mutable per-group record.
///
/// Created the first time an update references its index; mutated in place
/// afterwards. Groups are never destroyed individually - the count may
/// shrink to zero, which makes the group a no-op entry.
pub struct GroupState {
    pub id: usize,
    /// Flat interleaved coordinates, `2 * count` values.
    pub positions: Vec<f64>,
    /// Flat error magnitudes as supplied; zero-padded to `4 * count` at pack.
    pub errors: Vec<f32>,
    /// Resolved RGBA8 bytes, `4 * count` values.
    pub color: Vec<u8>,
    pub count: usize,
    /// Starting point index within the packed global buffers.
    pub offset: usize,
    /// `[minX, minY, maxX, maxY]` over positions.
    pub bounds: [f64; 4],
    /// Explicit data range; `None` means "follow bounds".
    range: Option<[f64; 4]>,
    pub scale: [f32; 2],
    pub scale_fract: [f32; 2],
    pub translate: [f32; 2],
    pub translate_fract: [f32; 2],
    /// Explicit viewport; `None` means "full surface".
    viewport: Option<Rect>,
    /// Stored already halved.
    pub line_width: f32,
    /// Stored already halved.
    pub cap_size: f32,
    pub opacity: f32,
    /// Sticky default-visibility flag for batched draws.
    pub draw: bool,
    pub after: Option<AfterHook>,
    color_spec: ColorSpec,
}

impl std::fmt::Debug for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupState")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("offset", &self.offset)
            .field("bounds", &self.bounds)
            .field("scale", &self.scale)
            .field("translate", &self.translate)
            .field("opacity", &self.opacity)
            .field("draw", &self.draw)
            .finish_non_exhaustive()
    }
}

impl GroupState {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            positions: Vec::new(),
            errors: Vec::new(),
            color: Vec::new(),
            count: 0,
            offset: 0,
            bounds: EMPTY_BOUNDS,
            range: None,
            scale: [1.0, 1.0],
            scale_fract: [0.0, 0.0],
            translate: [0.0, 0.0],
            translate_fract: [0.0, 0.0],
            viewport: None,
            line_width: 0.5,
            cap_size: 2.5,
            opacity: 1.0,
            draw: true,
            after: None,
            color_spec: ColorSpec::Uniform(Color::BLACK),
        }
    }

    /// Apply a sparse update, recomputing derived fields in dependency
    /// order: positions first (count, bounds, view mapping), then raw
    /// style fields, then colors (which need the final count), then the
    /// range-derived transform, then the viewport.
    ///
    /// The group's `offset` is not touched here; it is assigned batch-wide
    /// by the packer once every group's count is known.
    pub(crate) fn apply(&mut self, spec: GroupSpec) -> Result<ApplyEffect, UpdateError> {
        let mut effect = ApplyEffect::default();

        if let Some(positions) = spec.positions {
            let count = positions.len() / 2;
            effect.size_changed |= count != self.count;
            effect.data_changed = true;
            self.positions = positions;
            self.count = count;
            self.bounds = bounds2(&self.positions);
        }

        if let Some(errors) = spec.errors {
            self.errors = errors;
            effect.data_changed = true;
        }

        if let Some(width) = spec.line_width {
            self.line_width = width * 0.5;
        }
        if let Some(size) = spec.cap_size {
            self.cap_size = size * 0.5;
        }
        if let Some(opacity) = spec.opacity {
            self.opacity = opacity;
        }

        // Colors resolve against the (possibly new) count. A count change
        // re-broadcasts the stored spec so the color buffer never falls out
        // of step with the point count.
        if let Some(color) = spec.color {
            self.color_spec = color;
            self.resolve_color()?;
            effect.data_changed = true;
        } else if effect.size_changed {
            self.resolve_color()?;
        }

        if let Some(range) = spec.range {
            self.range = Some(range);
            self.derive_view();
        } else if effect.size_changed && self.range.is_none() {
            // No explicit range: the view mapping follows the data bounds.
            self.derive_view();
        }

        if let Some(viewport) = spec.viewport {
            self.viewport = Some(viewport.resolve());
        }

        if let Some(after) = spec.after {
            self.after = Some(after);
        }

        Ok(effect)
    }

    /// The effective data range: explicit if set, otherwise the bounds.
    pub fn range(&self) -> [f64; 4] {
        self.range.unwrap_or(self.bounds)
    }

    /// The effective viewport: explicit if set, otherwise the full surface.
    pub fn viewport(&self, surface: (u32, u32)) -> Rect {
        self.viewport
            .unwrap_or_else(|| Rect::new(0.0, 0.0, surface.0 as f32, surface.1 as f32))
    }

    /// Whether the group participates in a batched draw at all.
    pub fn visible(&self) -> bool {
        self.count > 0 && self.opacity > 0.0 && !self.positions.is_empty()
    }

    fn resolve_color(&mut self) -> Result<(), UpdateError> {
        let count = self.count;
        let mut data = vec![0u8; count * 4];
        match &self.color_spec {
            ColorSpec::Uniform(c) => {
                let bytes = c.to_rgba8();
                for chunk in data.chunks_exact_mut(4) {
                    chunk.copy_from_slice(&bytes);
                }
            }
            ColorSpec::PerPoint(colors) => {
                if colors.len() < count {
                    return Err(UpdateError::InsufficientColorData {
                        needed: count,
                        got: colors.len(),
                    });
                }
                for (chunk, c) in data.chunks_exact_mut(4).zip(colors) {
                    chunk.copy_from_slice(&c.to_rgba8());
                }
            }
        }
        self.color = data;
        Ok(())
    }

    /// Derive the unit-viewport mapping from the effective range and split
    /// it into f32 primaries plus residuals for the shader.
    fn derive_view(&mut self) {
        let r = self.range();
        let scale = [1.0 / (r[2] - r[0]), 1.0 / (r[3] - r[1])];
        let translate = [-r[0], -r[1]];
        (self.scale, self.scale_fract) = split::split2(scale);
        (self.translate, self.translate_fract) = split::split2(translate);
    }
}

const EMPTY_BOUNDS: [f64; 4] = [
    f64::INFINITY,
    f64::INFINITY,
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
];

/// Axis-aligned min/max over a flat stride-2 coordinate array.
pub fn bounds2(positions: &[f64]) -> [f64; 4] {
    let mut b = EMPTY_BOUNDS;
    for pair in positions.chunks_exact(2) {
        if pair[0] < b[0] {
            b[0] = pair[0];
        }
        if pair[1] < b[1] {
            b[1] = pair[1];
        }
        if pair[0] > b[2] {
            b[2] = pair[0];
        }
        if pair[1] > b[3] {
            b[3] = pair[1];
        }
    }
    b
}
