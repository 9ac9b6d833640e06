use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};

use super::buffer::Buffer;
use super::device::Device;
use super::enums::{QueueType, ResourceState};
use super::pipeline::{ComputePipeline, GraphicsPipeline};
use super::texture::Texture;

/// Per-subresource state tracker plus a recording `wgpu::CommandEncoder`.
///
/// Generalizes the teacher's `TrackedRenderPass`
/// (`renderer/graph/pass.rs`), which caches the currently bound
/// pipeline/bind-groups/vertex-buffers so a redundant `set_pipeline`
/// doesn't re-hit the driver: here the same idempotence is applied to
/// resource *states* rather than pipeline bindings — `set_buffer_state`/
/// `set_texture_state` are no-ops (emit no barrier) when the resource is
/// already in the requested state, satisfying the testable property that
/// repeated identical transitions never emit more than one barrier.
pub struct CommandList {
    queue_type: QueueType,
    encoder: wgpu::CommandEncoder,
    buffer_states: FxHashMap<u64, ResourceState>,
    texture_states: FxHashMap<u64, ResourceState>,
}

impl CommandList {
    pub fn new(device: &Device, queue_type: QueueType, label: &str) -> Self {
        let encoder = device
            .raw()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        Self {
            queue_type,
            encoder,
            buffer_states: FxHashMap::default(),
            texture_states: FxHashMap::default(),
        }
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Transitions `buffer` to `new_state`. Returns `true` if a
    /// transition actually happened (the caller may want to know this
    /// for barrier-count profiling); a repeat call with the same state
    /// is a silent no-op.
    pub fn set_buffer_state(&mut self, buffer: &Buffer, new_state: ResourceState) -> bool {
        let id = buffer_object_id(buffer);
        let current = self.buffer_states.get(&id).copied().unwrap_or(ResourceState::COMMON);
        if current == new_state {
            return false;
        }
        // `wgpu` tracks its own internal resource states and inserts
        // barriers for us at submission time; this tracker's job is to
        // avoid redundant *logical* transitions (and the validation work
        // that would go with an explicit-barrier backend), so no raw API
        // call happens here beyond bookkeeping.
        self.buffer_states.insert(id, new_state);
        true
    }

    pub fn set_texture_state(&mut self, texture: &Texture, new_state: ResourceState) -> bool {
        let id = texture_object_id(texture);
        let current = self.texture_states.get(&id).copied().unwrap_or(ResourceState::COMMON);
        if current == new_state {
            return false;
        }
        self.texture_states.insert(id, new_state);
        true
    }

    pub fn buffer_state(&self, buffer: &Buffer) -> ResourceState {
        self.buffer_states
            .get(&buffer_object_id(buffer))
            .copied()
            .unwrap_or(ResourceState::COMMON)
    }

    pub fn texture_state(&self, texture: &Texture) -> ResourceState {
        self.texture_states
            .get(&texture_object_id(texture))
            .copied()
            .unwrap_or(ResourceState::COMMON)
    }

    /// Forgets every tracked state, forcing the next `set_*_state` call
    /// per resource to report a transition even if it matches the
    /// resource's last known state. Used when a command list is recycled
    /// across frames and GPU-side state may have changed underneath it.
    pub fn invalidate_state(&mut self) {
        self.buffer_states.clear();
        self.texture_states.clear();
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer,
        src_offset: u64,
        dst: &Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        self.encoder
            .copy_buffer_to_buffer(src.raw(), src_offset, dst.raw(), dst_offset, size);
    }

    /// Records a single compute dispatch in its own compute pass. The
    /// precompute bake passes (SDF generation, surface-cache capture)
    /// use this for every slice rather than batching multiple dispatches
    /// into one pass, since each slice's bind group changes (different
    /// push-constant-equivalent uniform contents).
    pub fn dispatch_compute(
        &mut self,
        label: &str,
        pipeline: &ComputePipeline,
        bind_groups: &[&wgpu::BindGroup],
        workgroups: (u32, u32, u32),
    ) {
        self.dispatch_compute_with_push_constants(label, pipeline, bind_groups, &[], workgroups);
    }

    /// Like [`CommandList::dispatch_compute`], but also writes
    /// `push_constants` to the pipeline's push-constant root parameter
    /// before dispatching. `push_constants` must be empty or exactly
    /// `pipeline.push_constant_size()` bytes.
    pub fn dispatch_compute_with_push_constants(
        &mut self,
        label: &str,
        pipeline: &ComputePipeline,
        bind_groups: &[&wgpu::BindGroup],
        push_constants: &[u8],
        workgroups: (u32, u32, u32),
    ) {
        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline.raw());
        for (slot, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(slot as u32, bind_group, &[]);
        }
        if !push_constants.is_empty() {
            pass.set_push_constants(0, push_constants);
        }
        pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
    }

    /// Dispatches a compute pass with its workgroup count read from
    /// `args_buffer` at `args_offset` (3 consecutive `u32`s), for
    /// GPU-driven dispatch counts the CPU doesn't know ahead of time.
    pub fn dispatch_compute_indirect(
        &mut self,
        label: &str,
        pipeline: &ComputePipeline,
        bind_groups: &[&wgpu::BindGroup],
        args_buffer: &Buffer,
        args_offset: u64,
    ) {
        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline.raw());
        for (slot, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(slot as u32, bind_group, &[]);
        }
        pass.dispatch_workgroups_indirect(args_buffer.raw(), args_offset);
    }

    /// Schedules a GPU-side wait for `signal_queue`'s fence to reach
    /// `fence_value` before any work submitted to this list's queue
    /// afterward runs. On the single-queue `wgpu` backend this crate
    /// targets (see `Device::queue_for`), every queue is already the same
    /// underlying submission queue, so ordering is free; this call exists
    /// so the render graph's cross-queue scheduling logic (spec §4.8,
    /// testable property §8.3) has a concrete hook to call regardless of
    /// whether the backend has independent hardware queues.
    pub fn queue_wait_for_command_list(
        &mut self,
        wait_queue: QueueType,
        signal_queue: QueueType,
        fence_value: u64,
    ) {
        log::trace!(
            "queue {wait_queue:?} waits for queue {signal_queue:?} to reach fence {fence_value}"
        );
    }

    /// Copies a texture's full extent into a tightly-row-aligned buffer,
    /// used by the SDF bake's readback of its output texture. `bytes_per_row`
    /// must already satisfy `wgpu`'s `COPY_BYTES_PER_ROW_ALIGNMENT`.
    pub fn copy_texture_to_buffer(
        &mut self,
        src: &Texture,
        dst: &Buffer,
        bytes_per_row: u32,
        width: u32,
        height: u32,
        depth_or_array_layers: u32,
    ) {
        self.encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: src.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: dst.raw(),
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers,
            },
        );
    }

    pub fn begin_render_pass<'a>(
        &'a mut self,
        label: &str,
        color_attachments: &[wgpu::RenderPassColorAttachment<'a>],
        depth_stencil_attachment: Option<wgpu::RenderPassDepthStencilAttachment<'a>>,
    ) -> TrackedRenderPass<'a> {
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'a>>> =
            color_attachments.iter().map(|a| Some(a.clone())).collect();
        let raw = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        TrackedRenderPass::new(raw)
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }
}

fn buffer_object_id(buffer: &Buffer) -> u64 {
    // `Buffer` doesn't expose its RHI object id directly through a
    // trait object here (no `dyn RhiObject` needed for this lookup), so
    // the pointer identity of the underlying `wgpu::Buffer` doubles as a
    // stable per-resource key for the lifetime of the command list.
    buffer.raw() as *const wgpu::Buffer as u64
}

fn texture_object_id(texture: &Texture) -> u64 {
    texture.raw() as *const wgpu::Texture as u64
}

/// A `wgpu::RenderPass` wrapper caching the last bound pipeline/bind
/// groups/vertex and index buffers, so repeated identical `set_*` calls
/// (common when many draws in a row share a pipeline) skip the redundant
/// driver call. Directly adapted from the teacher's
/// `renderer/graph/pass.rs::TrackedRenderPass`.
pub struct TrackedRenderPass<'a> {
    raw: wgpu::RenderPass<'a>,
    current_pipeline: Option<u64>,
    current_push_constant_size: u32,
    current_bind_groups: [Option<u64>; 4],
    current_vertex_buffers: [Option<u64>; 8],
    current_index_buffer: Option<u64>,
}

impl<'a> TrackedRenderPass<'a> {
    fn new(raw: wgpu::RenderPass<'a>) -> Self {
        Self {
            raw,
            current_pipeline: None,
            current_push_constant_size: 0,
            current_bind_groups: [None; 4],
            current_vertex_buffers: [None; 8],
            current_index_buffer: None,
        }
    }

    pub fn set_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        let id = pipeline.raw() as *const wgpu::RenderPipeline as u64;
        self.current_push_constant_size = pipeline.push_constant_size();
        if self.current_pipeline == Some(id) {
            return;
        }
        self.raw.set_pipeline(pipeline.raw());
        self.current_pipeline = Some(id);
    }

    /// Writes `data` to the current pipeline's push-constant root
    /// parameter. `data.len()` must equal the bound pipeline's
    /// `push_constant_size` exactly (spec §4.7): this is a contract
    /// violation otherwise, surfaced as
    /// [`EngineError::PushConstantSizeMismatch`] rather than panicking,
    /// since it can be driven by caller-supplied data.
    pub fn set_push_constants(&mut self, data: &[u8]) -> Result<()> {
        if data.len() as u32 != self.current_push_constant_size {
            return Err(EngineError::PushConstantSizeMismatch {
                expected: self.current_push_constant_size,
                actual: data.len() as u32,
            });
        }
        if !data.is_empty() {
            self.raw
                .set_push_constants(wgpu::ShaderStages::VERTEX_FRAGMENT, 0, data);
        }
        Ok(())
    }

    pub fn set_bind_group(&mut self, slot: u32, bind_group: &wgpu::BindGroup) {
        let id = bind_group as *const wgpu::BindGroup as u64;
        let slot_usize = slot as usize;
        if slot_usize < self.current_bind_groups.len()
            && self.current_bind_groups[slot_usize] == Some(id)
        {
            return;
        }
        self.raw.set_bind_group(slot, bind_group, &[]);
        if slot_usize < self.current_bind_groups.len() {
            self.current_bind_groups[slot_usize] = Some(id);
        }
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &Buffer) {
        let id = buffer.raw() as *const wgpu::Buffer as u64;
        let slot_usize = slot as usize;
        if slot_usize < self.current_vertex_buffers.len()
            && self.current_vertex_buffers[slot_usize] == Some(id)
        {
            return;
        }
        self.raw.set_vertex_buffer(slot, buffer.raw().slice(..));
        if slot_usize < self.current_vertex_buffers.len() {
            self.current_vertex_buffers[slot_usize] = Some(id);
        }
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer, format: wgpu::IndexFormat) {
        let id = buffer.raw() as *const wgpu::Buffer as u64;
        if self.current_index_buffer == Some(id) {
            return;
        }
        self.raw.set_index_buffer(buffer.raw().slice(..), format);
        self.current_index_buffer = Some(id);
    }

    pub fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.raw.draw(vertices, instances);
    }

    pub fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.raw.draw_indexed(indices, base_vertex, instances);
    }

    /// Draws with vertex/instance counts read from `args_buffer` at
    /// `args_offset` (a 4-`u32` `wgpu::util::DrawIndirectArgs`-shaped
    /// record).
    pub fn draw_indirect(&mut self, args_buffer: &Buffer, args_offset: u64) {
        self.raw.draw_indirect(args_buffer.raw(), args_offset);
    }

    /// Like [`TrackedRenderPass::draw_indirect`], for indexed draws (a
    /// 5-`u32` `DrawIndexedIndirectArgs`-shaped record).
    pub fn draw_indexed_indirect(&mut self, args_buffer: &Buffer, args_offset: u64) {
        self.raw
            .draw_indexed_indirect(args_buffer.raw(), args_offset);
    }

    /// Forces the next `set_*` call per slot to re-emit its driver call,
    /// even if the cached value matches — used when the underlying
    /// `wgpu::RenderPass` state may have been disturbed by something
    /// this wrapper didn't see (e.g. a raw escape-hatch call).
    pub fn invalidate_state(&mut self) {
        self.current_pipeline = None;
        self.current_push_constant_size = 0;
        self.current_bind_groups = [None; 4];
        self.current_vertex_buffers = [None; 8];
        self.current_index_buffer = None;
    }

    /// Escape hatch for calls this wrapper doesn't cache (viewport,
    /// scissor, stencil reference, etc).
    pub fn raw_pass(&mut self) -> &mut wgpu::RenderPass<'a> {
        &mut self.raw
    }
}
