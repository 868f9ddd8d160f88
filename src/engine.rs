//! Top-level error-bar engine: update/draw orchestration.

use crate::batch::{BatchState, DrawSelection, UpdateRequest};
use crate::context::GraphicsContext;
use crate::group::{GroupState, UpdateError};
use crate::pack::pack;
use crate::renderer::ErrorBarRenderer;
use std::sync::Arc;

/// Batched 2D error-bar engine.
///
/// Owns the group list, the packed device buffers, and the instanced
/// pipeline. `update` mutates group state and re-uploads the packed
/// buffers when needed; `draw` only reads state and records one instanced
/// draw per visible group. Calls must be externally serialized - the
/// engine is single-threaded and synchronous throughout.
///
/// ```ignore
/// use errorbar2d::{ErrorBars, GraphicsContext, GroupSpec, Color, DrawSelection};
///
/// let ctx = GraphicsContext::new_owned_sync();
/// let mut bars = ErrorBars::new(ctx, target_format, (800, 600));
///
/// bars.update(
///     GroupSpec::new()
///         .positions(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0])
///         .errors(vec![0.1; 12])
///         .color(Color::RED),
/// )?;
///
/// // Inside a render pass:
/// bars.draw(&mut pass, DrawSelection::All);
/// ```
pub struct ErrorBars {
    renderer: ErrorBarRenderer,
    state: BatchState,
    surface_size: (u32, u32),
    pixel_ratio: f32,
}

impl ErrorBars {
    /// Create a new engine drawing into targets of `target_format`.
    ///
    /// `surface_size` is the full device surface in pixels; it is the
    /// default viewport/scissor for groups that never set one.
    pub fn new(
        context: Arc<GraphicsContext>,
        target_format: wgpu::TextureFormat,
        surface_size: (u32, u32),
    ) -> Self {
        Self {
            renderer: ErrorBarRenderer::new(context, target_format),
            state: BatchState::new(),
            surface_size,
            pixel_ratio: 1.0,
        }
    }

    /// Update the default viewport size, e.g. after a window resize.
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = (width, height);
    }

    /// Set the device pixel ratio used for line/cap pixel offsets.
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    /// Apply an update: a single [`GroupSpec`](crate::GroupSpec), a batch
    /// of specs, a flat position array, or an after-hook.
    ///
    /// Runs the diff pipeline per group, then repacks and re-uploads the
    /// global buffers when any packed content changed (a count change
    /// shifts every later group's offset, so the rebuild is batch-wide).
    /// A color error aborts before any packing.
    pub fn update(&mut self, request: impl Into<UpdateRequest>) -> Result<(), UpdateError> {
        let effect = self.state.update(request.into())?;
        self.renderer.ensure_group_slots(self.state.groups().len());

        if effect.size_changed || effect.data_changed {
            let packed = pack(&mut self.state.groups);
            self.renderer.upload(&packed);
        }

        Ok(())
    }

    /// Record draws for the selected groups into `pass`.
    ///
    /// Each drawn group gets its own viewport/scissor rectangle, uniform
    /// slot, and instance-buffer slice; its `after` hook runs once the
    /// draw is recorded. Render-pass state is fully re-established per
    /// group, so state from other consumers of the device cannot bleed in.
    pub fn draw(&mut self, pass: &mut wgpu::RenderPass, selection: impl Into<DrawSelection>) {
        for i in self.state.draw_list(&selection.into()) {
            let hook = self.state.groups[i].after.take();

            self.renderer
                .draw_group(pass, &self.state.groups[i], self.surface_size, self.pixel_ratio);

            if let Some(mut hook) = hook {
                hook(&self.state.groups[i]);
                self.state.groups[i].after = Some(hook);
            }
        }
    }

    /// Draw every flagged group.
    pub fn draw_all(&mut self, pass: &mut wgpu::RenderPass) {
        self.draw(pass, DrawSelection::All);
    }

    /// Read access to the group records.
    pub fn groups(&self) -> &[GroupState] {
        self.state.groups()
    }

    /// Tear the engine down, releasing all device buffers.
    ///
    /// Dropping the engine has the same effect; this form exists for call
    /// sites that want the release to read explicitly. The engine is gone
    /// afterwards - wgpu resources are freed with their handles.
    pub fn destroy(self) {
        tracing::debug!("Destroying error-bar engine");
    }
}
