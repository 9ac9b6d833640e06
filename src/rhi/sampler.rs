use super::object::{next_object_id, RefCount, RhiObject};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
    MirrorRepeat,
}

impl AddressMode {
    pub fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub max_anisotropy: u16,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            max_anisotropy: 1,
        }
    }
}

fn to_wgpu_filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

impl SamplerDesc {
    pub fn to_wgpu<'a>(&self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: self.address_mode_u.to_wgpu(),
            address_mode_v: self.address_mode_v.to_wgpu(),
            address_mode_w: self.address_mode_w.to_wgpu(),
            mag_filter: to_wgpu_filter(self.mag_filter),
            min_filter: to_wgpu_filter(self.min_filter),
            mipmap_filter: to_wgpu_filter(self.mipmap_filter),
            anisotropy_clamp: self.max_anisotropy.max(1) as u16,
            ..Default::default()
        }
    }
}

pub struct Sampler {
    id: u64,
    ref_count: RefCount,
    desc: SamplerDesc,
    raw: wgpu::Sampler,
}

impl Sampler {
    pub(crate) fn new(desc: SamplerDesc, raw: wgpu::Sampler) -> Self {
        Self {
            id: next_object_id(),
            ref_count: RefCount::new(),
            desc,
            raw,
        }
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    pub fn raw(&self) -> &wgpu::Sampler {
        &self.raw
    }

    pub fn ref_count(&self) -> &RefCount {
        &self.ref_count
    }
}

impl RhiObject for Sampler {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> &'static str {
        "Sampler"
    }
}
