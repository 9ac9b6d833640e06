use strum::EnumIter;

/// The engine's resource format table, independent of any single
/// backend's enum. [`Format::to_wgpu`] maps it onto the concrete
/// `wgpu::TextureFormat` the [`crate::rhi::device::Device`] actually
/// creates resources with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum Format {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R16Float,
    R8Unorm,
    Rg32Float,
    Rg16Float,
    Depth32Float,
    Depth24PlusStencil8,
    Rgb10a2Unorm,
}

impl Format {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Format::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Format::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            Format::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            Format::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            Format::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Format::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            Format::R32Float => wgpu::TextureFormat::R32Float,
            Format::R16Float => wgpu::TextureFormat::R16Float,
            Format::R8Unorm => wgpu::TextureFormat::R8Unorm,
            Format::Rg32Float => wgpu::TextureFormat::Rg32Float,
            Format::Rg16Float => wgpu::TextureFormat::Rg16Float,
            Format::Depth32Float => wgpu::TextureFormat::Depth32Float,
            Format::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            Format::Rgb10a2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
        }
    }

    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        Some(match format {
            wgpu::TextureFormat::Rgba8Unorm => Format::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => Format::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => Format::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => Format::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba16Float => Format::Rgba16Float,
            wgpu::TextureFormat::Rgba32Float => Format::Rgba32Float,
            wgpu::TextureFormat::R32Float => Format::R32Float,
            wgpu::TextureFormat::R16Float => Format::R16Float,
            wgpu::TextureFormat::R8Unorm => Format::R8Unorm,
            wgpu::TextureFormat::Rg32Float => Format::Rg32Float,
            wgpu::TextureFormat::Rg16Float => Format::Rg16Float,
            wgpu::TextureFormat::Depth32Float => Format::Depth32Float,
            wgpu::TextureFormat::Depth24PlusStencil8 => Format::Depth24PlusStencil8,
            wgpu::TextureFormat::Rgb10a2Unorm => Format::Rgb10a2Unorm,
            _ => return None,
        })
    }

    /// Bytes per texel for uncompressed formats, used to compute upload
    /// buffer sizes and row pitches.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Format::R8Unorm => 1,
            Format::R16Float => 2,
            Format::Rg16Float => 4,
            Format::Rgba8Unorm
            | Format::Rgba8UnormSrgb
            | Format::Bgra8Unorm
            | Format::Bgra8UnormSrgb
            | Format::R32Float
            | Format::Rg32Float
            | Format::Depth32Float
            | Format::Rgb10a2Unorm => 4,
            Format::Depth24PlusStencil8 => 4,
            Format::Rgba16Float => 8,
            Format::Rgba32Float => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Format::Depth32Float | Format::Depth24PlusStencil8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_format_round_trips_through_wgpu() {
        for format in Format::iter() {
            let wgpu_format = format.to_wgpu();
            assert_eq!(Format::from_wgpu(wgpu_format), Some(format));
        }
    }

    #[test]
    fn depth_formats_are_flagged() {
        assert!(Format::Depth32Float.is_depth());
        assert!(!Format::Rgba8Unorm.is_depth());
    }
}
