use std::sync::Arc;

use bitflags::bitflags;

use super::buffer::Buffer;
use super::format::Format;
use super::object::{next_object_id, RefCount, RhiObject};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED         = 1 << 0;
        const RENDER_TARGET   = 1 << 1;
        const DEPTH_STENCIL   = 1 << 2;
        const STORAGE         = 1 << 3;
        const COPY_SRC        = 1 << 4;
        const COPY_DST        = 1 << 5;
    }
}

impl TextureUsage {
    pub fn to_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.contains(TextureUsage::SAMPLED) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(TextureUsage::RENDER_TARGET) || self.contains(TextureUsage::DEPTH_STENCIL)
        {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(TextureUsage::STORAGE) {
            usages |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.contains(TextureUsage::COPY_SRC) {
            usages |= wgpu::TextureUsages::COPY_SRC;
        }
        if self.contains(TextureUsage::COPY_DST) {
            usages |= wgpu::TextureUsages::COPY_DST;
        }
        usages
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
    Cube,
}

#[derive(Clone, Debug)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_levels: u32,
    pub dimension: TextureDimension,
    pub format: Format,
    pub usage: TextureUsage,
}

impl TextureDesc {
    pub fn to_wgpu_dimension(&self) -> wgpu::TextureDimension {
        match self.dimension {
            TextureDimension::D1 => wgpu::TextureDimension::D1,
            TextureDimension::D2 | TextureDimension::Cube => wgpu::TextureDimension::D2,
            TextureDimension::D3 => wgpu::TextureDimension::D3,
        }
    }
}

/// A GPU texture resource, and the default view over its full extent
/// used by most render passes (a binding that needs a sub-range view
/// creates one separately via [`wgpu::Texture::create_view`] on
/// [`Texture::raw`]).
pub struct Texture {
    id: u64,
    ref_count: RefCount,
    desc: TextureDesc,
    raw: wgpu::Texture,
    default_view: wgpu::TextureView,
}

impl Texture {
    pub(crate) fn new(desc: TextureDesc, raw: wgpu::Texture, default_view: wgpu::TextureView) -> Self {
        Self {
            id: next_object_id(),
            ref_count: RefCount::new(),
            desc,
            raw,
            default_view,
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.raw
    }

    pub fn default_view(&self) -> &wgpu::TextureView {
        &self.default_view
    }

    pub fn ref_count(&self) -> &RefCount {
        &self.ref_count
    }
}

impl RhiObject for Texture {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Texture"
    }
}

/// Whether a staging texture is the target of a GPU→CPU read-back or
/// the source of a CPU→GPU upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CpuAccess {
    Read,
    Write,
}

/// A CPU-visible, row-pitch-aligned linear resource shaped like a
/// texture, used to read back or upload [`Texture`] contents.
///
/// `wgpu` has no first-class "staging texture" the way D3D12/Vulkan do —
/// the portable equivalent is a plain mappable buffer whose row stride
/// already satisfies `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`, which is
/// exactly what a row-pitch-aligned D3D12 read-back texture is under
/// the hood. [`Device::create_staging_texture`] computes that stride and
/// hands back the buffer wrapped with the image shape needed to
/// interpret it.
pub struct StagingTexture {
    buffer: Arc<Buffer>,
    cpu_access: CpuAccess,
    width: u32,
    height: u32,
    depth_or_array_layers: u32,
    bytes_per_row: u32,
    format: Format,
}

impl StagingTexture {
    pub(crate) fn new(
        buffer: Arc<Buffer>,
        cpu_access: CpuAccess,
        width: u32,
        height: u32,
        depth_or_array_layers: u32,
        bytes_per_row: u32,
        format: Format,
    ) -> Self {
        Self {
            buffer,
            cpu_access,
            width,
            height,
            depth_or_array_layers,
            bytes_per_row,
            format,
        }
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn cpu_access(&self) -> CpuAccess {
        self.cpu_access
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth_or_array_layers(&self) -> u32 {
        self.depth_or_array_layers
    }

    /// Bytes between the start of consecutive rows, already aligned to
    /// `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`.
    pub fn bytes_per_row(&self) -> u32 {
        self.bytes_per_row
    }

    pub fn format(&self) -> Format {
        self.format
    }
}
