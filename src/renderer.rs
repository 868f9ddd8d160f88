//! Instanced wgpu pipeline for error-bar glyphs.
//!
//! One draw call renders a whole group: the fixed 36-vertex template is
//! bound as per-vertex attributes, the packed global buffers as
//! per-instance attributes (advancing once per instance), and the group's
//! view mapping and style as a small uniform. Sub-f32 position residuals
//! are re-summed in the vertex shader to recover double-precision
//! placement at deep zoom.

use crate::context::GraphicsContext;
use crate::group::GroupState;
use crate::mesh::{TEMPLATE, TEMPLATE_VERTEX_COUNT, TemplateVertex};
use crate::pack::PackedBuffers;
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Per-group uniform data.
///
/// Layout (64 bytes, 8-byte aligned vec2 fields first):
/// ```text
/// offset 0:  vec2<f32> scale
/// offset 8:  vec2<f32> scale_fract
/// offset 16: vec2<f32> translate
/// offset 24: vec2<f32> translate_fract
/// offset 32: vec2<f32> pixel_scale
/// offset 40: f32       line_width
/// offset 44: f32       cap_size
/// offset 48: f32       opacity
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct ErrorBarUniforms {
    scale: [f32; 2],
    scale_fract: [f32; 2],
    translate: [f32; 2],
    translate_fract: [f32; 2],
    pixel_scale: [f32; 2],
    line_width: f32,
    cap_size: f32,
    opacity: f32,
    _padding: [f32; 3],
}

/// GPU-side uniform buffer and bind group for one group slot.
struct GroupResources {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// The packed per-instance buffers currently resident on the device.
struct InstanceBuffers {
    position_hi: wgpu::Buffer,
    position_lo: wgpu::Buffer,
    error: wgpu::Buffer,
    color: wgpu::Buffer,
}

/// Instanced error-bar renderer.
///
/// Owns the render pipeline, the static geometry template, the shared
/// instance buffers, and one uniform slot per group. Groups share the
/// instance buffers and select their slice by byte offset at draw time.
pub struct ErrorBarRenderer {
    context: Arc<GraphicsContext>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    mesh_buffer: wgpu::Buffer,
    instances: Option<InstanceBuffers>,
    groups: Vec<GroupResources>,
}

impl ErrorBarRenderer {
    /// Create a new renderer with the given target texture format.
    ///
    /// The `target_format` must match the render target this renderer will
    /// draw into.
    pub fn new(context: Arc<GraphicsContext>, target_format: wgpu::TextureFormat) -> Self {
        let bind_group_layout =
            context
                .device()
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Error Bar Bind Group Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });

        let shader = context
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Error Bar Shader"),
                source: wgpu::ShaderSource::Wgsl(ERROR_BAR_SHADER.into()),
            });

        let pipeline_layout =
            context
                .device()
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Error Bar Pipeline Layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });

        let pipeline = context
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Error Bar Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[
                        // Shared geometry template
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<TemplateVertex>() as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &[
                                wgpu::VertexAttribute {
                                    format: wgpu::VertexFormat::Float32x2,
                                    offset: 0,
                                    shader_location: 0,
                                },
                                wgpu::VertexAttribute {
                                    format: wgpu::VertexFormat::Float32x2,
                                    offset: 8,
                                    shader_location: 1,
                                },
                                wgpu::VertexAttribute {
                                    format: wgpu::VertexFormat::Float32x2,
                                    offset: 16,
                                    shader_location: 2,
                                },
                            ],
                        },
                        // Per-instance position (primary)
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 3,
                            }],
                        },
                        // Per-instance position (residual)
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 4,
                            }],
                        },
                        // Per-instance error magnitudes
                        wgpu::VertexBufferLayout {
                            array_stride: 16,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x4,
                                offset: 0,
                                shader_location: 5,
                            }],
                        },
                        // Per-instance color
                        wgpu::VertexBufferLayout {
                            array_stride: 4,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Unorm8x4,
                                offset: 0,
                                shader_location: 6,
                            }],
                        },
                    ],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::SrcAlpha,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let mesh_buffer = context
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Error Bar Template Buffer"),
                contents: bytemuck::cast_slice(&TEMPLATE),
                usage: wgpu::BufferUsages::VERTEX,
            });

        Self {
            context,
            pipeline,
            bind_group_layout,
            mesh_buffer,
            instances: None,
            groups: Vec::new(),
        }
    }

    /// Upload freshly packed instance data, replacing the resident buffers.
    pub fn upload(&mut self, packed: &PackedBuffers) {
        if packed.total == 0 {
            self.instances = None;
            return;
        }

        tracing::trace!("Uploading {} error-bar instances to GPU", packed.total);

        let device = self.context.device();
        let mk = |label, contents| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        };

        self.instances = Some(InstanceBuffers {
            position_hi: mk("Error Bar Position Buffer", bytemuck::cast_slice(&packed.position_hi)),
            position_lo: mk(
                "Error Bar Position Fraction Buffer",
                bytemuck::cast_slice(&packed.position_lo),
            ),
            error: mk("Error Bar Error Buffer", bytemuck::cast_slice(&packed.error)),
            color: mk("Error Bar Color Buffer", packed.color.as_slice()),
        });
    }

    /// Make sure a uniform slot exists for every group index up to `count`.
    pub fn ensure_group_slots(&mut self, count: usize) {
        let device = self.context.device();
        while self.groups.len() < count {
            let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Error Bar Uniform Buffer"),
                size: std::mem::size_of::<ErrorBarUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Error Bar Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            self.groups.push(GroupResources {
                uniform_buffer,
                bind_group,
            });
        }
    }

    /// Record one instanced draw for a group.
    ///
    /// Sets the group's viewport and scissor rectangle, writes its uniform
    /// slot, binds the template plus the group's instance-buffer slices,
    /// and draws `count` instances of the 36-vertex template.
    pub fn draw_group(
        &self,
        pass: &mut wgpu::RenderPass,
        group: &GroupState,
        surface: (u32, u32),
        pixel_ratio: f32,
    ) {
        if group.count == 0 {
            return;
        }
        let Some(instances) = &self.instances else {
            return;
        };
        let Some(resources) = self.groups.get(group.id) else {
            return;
        };

        let viewport = group.viewport(surface);

        let uniforms = ErrorBarUniforms {
            scale: group.scale,
            scale_fract: group.scale_fract,
            translate: group.translate,
            translate_fract: group.translate_fract,
            pixel_scale: [
                pixel_ratio / viewport.width,
                pixel_ratio / viewport.height,
            ],
            line_width: group.line_width,
            cap_size: group.cap_size,
            opacity: group.opacity,
            _padding: [0.0; 3],
        };
        self.context.queue().write_buffer(
            &resources.uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms]),
        );

        let sx = viewport.x.max(0.0) as u32;
        let sy = viewport.y.max(0.0) as u32;

        pass.push_debug_group("ErrorBarRenderer::draw_group");
        pass.set_pipeline(&self.pipeline);
        pass.set_viewport(viewport.x, viewport.y, viewport.width, viewport.height, 0.0, 1.0);
        pass.set_scissor_rect(sx, sy, viewport.width as u32, viewport.height as u32);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.set_vertex_buffer(0, self.mesh_buffer.slice(..));
        pass.set_vertex_buffer(1, instances.position_hi.slice(group.offset as u64 * 8..));
        pass.set_vertex_buffer(2, instances.position_lo.slice(group.offset as u64 * 8..));
        pass.set_vertex_buffer(3, instances.error.slice(group.offset as u64 * 16..));
        pass.set_vertex_buffer(4, instances.color.slice(group.offset as u64 * 4..));
        pass.draw(0..TEMPLATE_VERTEX_COUNT, 0..group.count as u32);
        pass.pop_debug_group();
    }
}

/// WGSL shader expanding one instance into the bar-plus-caps template.
///
/// The projected position is computed as
/// `(hi + translate) * scale` re-summed across the hi/lo residual pairs,
/// then pixel-space line/cap offsets are added and the unit square is
/// mapped to clip space.
const ERROR_BAR_SHADER: &str = r#"
struct Uniforms {
    scale: vec2<f32>,
    scale_fract: vec2<f32>,
    translate: vec2<f32>,
    translate_fract: vec2<f32>,
    pixel_scale: vec2<f32>,
    line_width: f32,
    cap_size: f32,
    opacity: f32,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) direction: vec2<f32>,
    @location(1) line_offset: vec2<f32>,
    @location(2) cap_offset: vec2<f32>,
    @location(3) position: vec2<f32>,
    @location(4) position_fract: vec2<f32>,
    @location(5) error: vec4<f32>,
    @location(6) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.color = input.color;

    let pixel_offset = uniforms.line_width * input.line_offset
        + (uniforms.cap_size + uniforms.line_width) * input.cap_offset;

    // Select the error magnitude this vertex displaces along, signed by
    // the template direction.
    let dxy = -step(vec2<f32>(0.5), input.direction) * input.error.xz
        + step(input.direction, vec2<f32>(-0.5)) * input.error.yw;

    let base = input.position + dxy;

    var pos = (base + uniforms.translate) * uniforms.scale
        + (input.position_fract + uniforms.translate_fract) * uniforms.scale
        + (base + uniforms.translate) * uniforms.scale_fract
        + (input.position_fract + uniforms.translate_fract) * uniforms.scale_fract;

    pos += uniforms.pixel_scale * pixel_offset;

    out.clip_position = vec4<f32>(pos * 2.0 - 1.0, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.color.rgb, input.color.a * uniforms.opacity);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_size() {
        // Must match the WGSL struct layout (rounded up to 64 bytes).
        assert_eq!(std::mem::size_of::<ErrorBarUniforms>(), 64);
    }

    #[test]
    fn test_template_stride_matches_layout() {
        // Three vec2 attributes at offsets 0/8/16.
        assert_eq!(std::mem::size_of::<TemplateVertex>(), 24);
    }
}
