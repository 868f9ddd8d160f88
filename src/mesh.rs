//! Fixed per-vertex geometry template for one error-bar glyph.
//!
//! A single data point expands on the GPU into six quads (two triangles
//! each): a bar along each axis plus a perpendicular cap at each bar end.
//! The template below is the only geometry ever uploaded; every instance
//! reuses it with its own position/error/color attributes.

use bytemuck::{Pod, Zeroable};

/// One row of the shared geometry template.
///
/// `direction` selects which of the four error magnitudes displaces this
/// vertex and with which sign. `line_offset` and `cap_offset` are unit
/// offsets scaled at draw time by the line width and `cap_size + line_width`
/// respectively, then converted to pixel-space displacement in the shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TemplateVertex {
    pub direction: [f32; 2],
    pub line_offset: [f32; 2],
    pub cap_offset: [f32; 2],
}

const fn v(dx: f32, dy: f32, lx: f32, ly: f32, cx: f32, cy: f32) -> TemplateVertex {
    TemplateVertex {
        direction: [dx, dy],
        line_offset: [lx, ly],
        cap_offset: [cx, cy],
    }
}

/// Number of template vertices drawn per instance.
pub const TEMPLATE_VERTEX_COUNT: u32 = 36;

/// The shared error-bar template: six 6-vertex shapes, uploaded once as a
/// static vertex buffer and never mutated.
pub const TEMPLATE: [TemplateVertex; TEMPLATE_VERTEX_COUNT as usize] = [
    // x-axis bar
    v(1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
    v(1.0, 0.0, 0.0, -1.0, 0.0, 0.0),
    v(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0),
    v(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0),
    v(-1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
    v(1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
    // x-axis right cap
    v(1.0, 0.0, -1.0, 0.0, 0.0, 1.0),
    v(1.0, 0.0, -1.0, 0.0, 0.0, -1.0),
    v(1.0, 0.0, 1.0, 0.0, 0.0, -1.0),
    v(1.0, 0.0, 1.0, 0.0, 0.0, -1.0),
    v(1.0, 0.0, 1.0, 0.0, 0.0, 1.0),
    v(1.0, 0.0, -1.0, 0.0, 0.0, 1.0),
    // x-axis left cap
    v(-1.0, 0.0, -1.0, 0.0, 0.0, 1.0),
    v(-1.0, 0.0, -1.0, 0.0, 0.0, -1.0),
    v(-1.0, 0.0, 1.0, 0.0, 0.0, -1.0),
    v(-1.0, 0.0, 1.0, 0.0, 0.0, -1.0),
    v(-1.0, 0.0, 1.0, 0.0, 0.0, 1.0),
    v(-1.0, 0.0, -1.0, 0.0, 0.0, 1.0),
    // y-axis bar
    v(0.0, 1.0, 1.0, 0.0, 0.0, 0.0),
    v(0.0, 1.0, -1.0, 0.0, 0.0, 0.0),
    v(0.0, -1.0, -1.0, 0.0, 0.0, 0.0),
    v(0.0, -1.0, -1.0, 0.0, 0.0, 0.0),
    v(0.0, 1.0, 1.0, 0.0, 0.0, 0.0),
    v(0.0, -1.0, 1.0, 0.0, 0.0, 0.0),
    // y-axis top cap
    v(0.0, 1.0, 0.0, -1.0, 1.0, 0.0),
    v(0.0, 1.0, 0.0, -1.0, -1.0, 0.0),
    v(0.0, 1.0, 0.0, 1.0, -1.0, 0.0),
    v(0.0, 1.0, 0.0, 1.0, 1.0, 0.0),
    v(0.0, 1.0, 0.0, -1.0, 1.0, 0.0),
    v(0.0, 1.0, 0.0, 1.0, -1.0, 0.0),
    // y-axis bottom cap
    v(0.0, -1.0, 0.0, -1.0, 1.0, 0.0),
    v(0.0, -1.0, 0.0, -1.0, -1.0, 0.0),
    v(0.0, -1.0, 0.0, 1.0, -1.0, 0.0),
    v(0.0, -1.0, 0.0, 1.0, 1.0, 0.0),
    v(0.0, -1.0, 0.0, -1.0, 1.0, 0.0),
    v(0.0, -1.0, 0.0, 1.0, -1.0, 0.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_shape() {
        assert_eq!(TEMPLATE.len(), 36);
        assert_eq!(std::mem::size_of::<TemplateVertex>(), 24);
    }

    #[test]
    fn test_direction_components_are_unit_or_zero() {
        for row in &TEMPLATE {
            for c in row.direction {
                assert!(c == -1.0 || c == 0.0 || c == 1.0);
            }
            // Every vertex displaces along exactly one axis.
            assert_eq!(row.direction[0].abs() + row.direction[1].abs(), 1.0);
        }
    }

    #[test]
    fn test_bars_have_no_cap_offset() {
        // Shapes 0 (x bar) and 3 (y bar) are plain bars.
        for shape in [0, 3] {
            for row in &TEMPLATE[shape * 6..shape * 6 + 6] {
                assert_eq!(row.cap_offset, [0.0, 0.0]);
            }
        }
    }

    #[test]
    fn test_caps_extend_perpendicular() {
        // x-axis caps offset along y, y-axis caps along x.
        for row in &TEMPLATE[6..18] {
            assert_eq!(row.cap_offset[0], 0.0);
            assert_ne!(row.cap_offset[1], 0.0);
        }
        for row in &TEMPLATE[24..36] {
            assert_ne!(row.cap_offset[0], 0.0);
            assert_eq!(row.cap_offset[1], 0.0);
        }
    }
}
