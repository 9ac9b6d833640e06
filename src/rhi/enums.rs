use bitflags::bitflags;

/// Which hardware queue a command list (or render-graph pass) targets.
/// Distinct queues can run concurrently and are synchronized explicitly
/// via fences — see `rendergraph` for the Wait/Signal flag computation
/// that keeps cross-queue work ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Copy,
}

impl QueueType {
    pub const ALL: [QueueType; 3] = [QueueType::Graphics, QueueType::Compute, QueueType::Copy];
}

bitflags! {
    /// Per-subresource usage state, tracked by [`crate::rhi::command_list::CommandList`]
    /// so a barrier is only emitted when the state actually changes
    /// (idempotent transitions are a no-op).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const COMMON          = 0;
        const VERTEX_BUFFER   = 1 << 0;
        const INDEX_BUFFER    = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const RENDER_TARGET   = 1 << 5;
        const DEPTH_WRITE     = 1 << 6;
        const DEPTH_READ      = 1 << 7;
        const COPY_SOURCE     = 1 << 8;
        const COPY_DEST       = 1 << 9;
        const INDIRECT_ARGUMENT = 1 << 10;
        const PRESENT         = 1 << 11;
    }
}

bitflags! {
    /// Shader stages a binding slot or push-constant range is visible
    /// to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
        const ALL = Self::VERTEX.bits() | Self::FRAGMENT.bits() | Self::COMPUTE.bits();
    }
}
