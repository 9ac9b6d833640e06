use bitflags::bitflags;

use super::object::{next_object_id, RefCount, RhiObject};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX   = 1 << 0;
        const INDEX    = 1 << 1;
        const UNIFORM  = 1 << 2;
        const STORAGE  = 1 << 3;
        const INDIRECT = 1 << 4;
        const COPY_SRC = 1 << 5;
        const COPY_DST = 1 << 6;
    }
}

impl BufferUsage {
    pub fn to_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::empty();
        if self.contains(BufferUsage::VERTEX) {
            usages |= wgpu::BufferUsages::VERTEX;
        }
        if self.contains(BufferUsage::INDEX) {
            usages |= wgpu::BufferUsages::INDEX;
        }
        if self.contains(BufferUsage::UNIFORM) {
            usages |= wgpu::BufferUsages::UNIFORM;
        }
        if self.contains(BufferUsage::STORAGE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        if self.contains(BufferUsage::INDIRECT) {
            usages |= wgpu::BufferUsages::INDIRECT;
        }
        if self.contains(BufferUsage::COPY_SRC) {
            usages |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.contains(BufferUsage::COPY_DST) {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        usages
    }
}

#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    pub usage: BufferUsage,
    /// Whether the buffer is persistently CPU-mappable (staging/upload
    /// buffers) as opposed to device-local.
    pub cpu_visible: bool,
}

/// A GPU buffer resource.
pub struct Buffer {
    id: u64,
    ref_count: RefCount,
    desc: BufferDesc,
    raw: wgpu::Buffer,
}

impl Buffer {
    pub(crate) fn new(desc: BufferDesc, raw: wgpu::Buffer) -> Self {
        Self {
            id: next_object_id(),
            ref_count: RefCount::new(),
            desc,
            raw,
        }
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }
}

impl RhiObject for Buffer {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Buffer"
    }
}

impl Buffer {
    pub fn ref_count(&self) -> &RefCount {
        &self.ref_count
    }
}
