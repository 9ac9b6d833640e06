use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{EngineError, Result};

use super::buffer::{Buffer, BufferDesc, BufferUsage};
use super::enums::QueueType;
use super::sampler::{Sampler, SamplerDesc};
use super::texture::{CpuAccess, StagingTexture, Texture, TextureDesc};

/// A resource released by the caller but not yet safe to drop: the GPU
/// work submitted up through `fence_value` must complete first, since
/// that work may still be reading or writing it.
enum Garbage {
    Buffer(Arc<Buffer>),
    Texture(Arc<Texture>),
}

struct GarbageEntry {
    fence_value: u64,
    resource: Garbage,
}

/// The concrete RHI device, backed by `wgpu`.
///
/// `wgpu` multiplexes a single abstract device/queue surface over
/// Direct3D 12, Vulkan, and Metal, selected via [`wgpu::Backends`] at
/// adapter-request time — see `SPEC_FULL.md` §12. `wgpu` exposes one
/// submission queue rather than the original's independent
/// graphics/compute/copy hardware queues; [`Device::queue_for`] returns
/// the same underlying queue for every [`QueueType`] today, which is
/// the "partial" part of the partial-Vulkan-equivalent backend this
/// crate provides. The render graph's queue-aware scheduling (batching,
/// cross-queue fences) is still exercised in full against this single
/// queue, so its ordering guarantees hold even though true hardware
/// queue concurrency isn't realized yet.
pub struct Device {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// Fence value assigned to the next [`Device::submit`] call. Shared
    /// (monotonic) across every [`QueueType`] — see the single-queue
    /// caveat above.
    next_fence: AtomicU64,
    /// Highest fence value the GPU has actually finished. Advanced from
    /// `wgpu::Queue::on_submitted_work_done` callbacks registered in
    /// [`Device::submit`].
    completed_fence: Arc<AtomicU64>,
    garbage: Mutex<Vec<GarbageEntry>>,
}

impl Device {
    /// Requests an adapter and device from the given backend set
    /// (`wgpu::Backends::PRIMARY` covers D3D12/Vulkan/Metal, letting the
    /// platform pick; pass `wgpu::Backends::VULKAN` or `DX12` to pin
    /// one).
    pub async fn new(backends: wgpu::Backends) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::AdapterRequestFailed("no compatible adapter".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glint-device"),
                    // `PUSH_CONSTANTS` backs `CommandList::set_push_constants`
                    // (spec §4.7); not every adapter supports it, but it's
                    // part of `wgpu`'s portable feature set on the
                    // D3D12/Vulkan backends this crate targets.
                    required_features: wgpu::Features::PUSH_CONSTANTS,
                    required_limits: wgpu::Limits {
                        max_push_constant_size: 128,
                        ..wgpu::Limits::default()
                    },
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            next_fence: AtomicU64::new(0),
            completed_fence: Arc::new(AtomicU64::new(0)),
            garbage: Mutex::new(Vec::new()),
        })
    }

    pub fn raw(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns the queue to submit command lists of `queue_type` to. See
    /// the type-level doc comment for the current single-queue caveat.
    pub fn queue_for(&self, _queue_type: QueueType) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_buffer(&self, desc: BufferDesc) -> Arc<Buffer> {
        let mut usage = desc.usage.to_wgpu();
        if desc.cpu_visible {
            usage |= wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE;
        }
        let raw = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size: desc.size,
            usage,
            mapped_at_creation: false,
        });
        Arc::new(Buffer::new(desc, raw))
    }

    pub fn create_texture(&self, desc: TextureDesc) -> Arc<Texture> {
        let raw = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.depth_or_array_layers,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: desc.to_wgpu_dimension(),
            format: desc.format.to_wgpu(),
            usage: desc.usage.to_wgpu(),
            view_formats: &[],
        });
        let default_view = raw.create_view(&wgpu::TextureViewDescriptor::default());
        Arc::new(Texture::new(desc, raw, default_view))
    }

    pub fn create_sampler(&self, desc: SamplerDesc) -> Arc<Sampler> {
        let raw = self.device.create_sampler(&desc.to_wgpu(None));
        Arc::new(Sampler::new(desc, raw))
    }

    /// Allocates a row-pitch-aligned linear resource for reading back or
    /// uploading `desc`'s image shape (spec §4.5). The backing memory is
    /// a CPU-mappable `wgpu::Buffer`; see [`StagingTexture`] for why that
    /// is the correct portable stand-in for a D3D12/Vulkan staging
    /// texture.
    pub fn create_staging_texture(
        &self,
        desc: &TextureDesc,
        cpu_access: CpuAccess,
    ) -> Arc<StagingTexture> {
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unaligned_row_bytes = desc.width * desc.format.bytes_per_texel();
        let bytes_per_row = unaligned_row_bytes.div_ceil(align) * align;
        let size =
            bytes_per_row as u64 * desc.height as u64 * desc.depth_or_array_layers.max(1) as u64;

        let usage = match cpu_access {
            CpuAccess::Read => BufferUsage::COPY_DST,
            CpuAccess::Write => BufferUsage::COPY_SRC,
        };
        let buffer_desc = BufferDesc {
            label: format!("{}-staging", desc.label),
            size,
            usage,
            cpu_visible: true,
        };
        let buffer = self.create_buffer(buffer_desc);
        Arc::new(StagingTexture::new(
            buffer,
            cpu_access,
            desc.width,
            desc.height,
            desc.depth_or_array_layers.max(1),
            bytes_per_row,
            desc.format,
        ))
    }

    /// Wraps a `wgpu::Texture` the engine did not allocate (a swap-chain
    /// back buffer, most commonly) so it participates in binding and
    /// state tracking like any other [`Texture`] (spec §4.5).
    pub fn create_texture_from_native(&self, native: wgpu::Texture, desc: TextureDesc) -> Arc<Texture> {
        let default_view = native.create_view(&wgpu::TextureViewDescriptor::default());
        Arc::new(Texture::new(desc, native, default_view))
    }

    /// Wraps an externally created `wgpu::Buffer` without allocating new
    /// GPU memory (spec §4.5).
    pub fn create_buffer_from_native(&self, native: wgpu::Buffer, desc: BufferDesc) -> Arc<Buffer> {
        Arc::new(Buffer::new(desc, native))
    }

    /// Submits `command_buffers` to `queue_type`'s queue and returns the
    /// fence value this submission is tagged with. Fence values are
    /// monotonic across every queue, matching the single shared `wgpu`
    /// queue described on [`Device`]'s type-level doc comment.
    /// [`Device::run_garbage_collection`] uses the returned value (via
    /// resources queued through [`Device::release_buffer`] /
    /// [`Device::release_texture`]) to know when it's safe to drop them.
    pub fn submit<I>(&self, queue_type: QueueType, command_buffers: I) -> u64
    where
        I: IntoIterator<Item = wgpu::CommandBuffer>,
    {
        let fence_value = self.next_fence.fetch_add(1, Ordering::AcqRel) + 1;
        self.queue_for(queue_type).submit(command_buffers);

        let completed = self.completed_fence.clone();
        self.queue_for(queue_type)
            .on_submitted_work_done(move || {
                let mut observed = completed.load(Ordering::Acquire);
                while observed < fence_value {
                    match completed.compare_exchange_weak(
                        observed,
                        fence_value,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break,
                        Err(actual) => observed = actual,
                    }
                }
            });

        fence_value
    }

    /// Queues `buffer` for destruction once every submission issued so
    /// far has completed on the GPU, rather than dropping it (and
    /// freeing its `wgpu::Buffer`) immediately (spec §4.5 garbage
    /// collection).
    pub fn release_buffer(&self, buffer: Arc<Buffer>) {
        let fence_value = self.next_fence.load(Ordering::Acquire);
        self.garbage.lock().push(GarbageEntry {
            fence_value,
            resource: Garbage::Buffer(buffer),
        });
    }

    /// Queues `texture` for destruction once every submission issued so
    /// far has completed on the GPU.
    pub fn release_texture(&self, texture: Arc<Texture>) {
        let fence_value = self.next_fence.load(Ordering::Acquire);
        self.garbage.lock().push(GarbageEntry {
            fence_value,
            resource: Garbage::Texture(texture),
        });
    }

    /// Evicts (actually drops) every queued released resource whose
    /// tracked fence value has already completed on the GPU.
    pub fn run_garbage_collection(&self) {
        let completed = self.completed_fence.load(Ordering::Acquire);
        self.garbage
            .lock()
            .retain(|entry| entry.fence_value > completed);
    }

    /// Number of released resources still awaiting GPU completion.
    /// Exposed for tests; not part of the steady-state API surface.
    pub fn pending_garbage_count(&self) -> usize {
        self.garbage.lock().len()
    }

    /// Polls the device for completed GPU work; call once per frame on
    /// backends (e.g. Vulkan via `wgpu`) that don't poll implicitly.
    pub fn poll(&self) {
        self.device.poll(wgpu::Maintain::Poll);
    }

    /// Blocks the calling thread until all submitted GPU work has
    /// completed, used by [`crate::rendergraph::RenderGraph::execute`]'s
    /// end-of-frame wait-for-idle step (spec §4.8 step 7).
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
