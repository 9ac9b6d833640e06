use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::binding::BindingLayout;
use super::device::Device;
use super::format::Format;
use super::texture::Texture;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Sint32,
}

impl VertexFormat {
    pub fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
        }
    }

    pub fn size_bytes(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
}

/// A single vertex buffer's attribute layout, expanded from its
/// attribute list into `wgpu::VertexAttribute`s with computed offsets —
/// mirroring the teacher's `renderer/pipeline/vertex.rs` expansion of a
/// vertex declaration by `array_size` into concrete attribute slots.
#[derive(Clone, Debug)]
pub struct InputLayout {
    pub attributes: Vec<VertexAttribute>,
    pub stride: u64,
}

impl InputLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        let mut offset = 0u64;
        for attribute in &attributes {
            offset += attribute.format.size_bytes();
        }
        Self {
            stride: offset,
            attributes,
        }
    }

    fn to_wgpu(&self, wgpu_attrs: &mut Vec<wgpu::VertexAttribute>) -> wgpu::VertexBufferLayout<'_> {
        wgpu_attrs.clear();
        let mut offset = 0u64;
        for attribute in &self.attributes {
            wgpu_attrs.push(wgpu::VertexAttribute {
                format: attribute.format.to_wgpu(),
                offset,
                shader_location: attribute.location,
            });
            offset += attribute.format.size_bytes();
        }
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: wgpu_attrs,
        }
    }
}

/// Everything needed to build a `wgpu::RenderPipeline`, kept around so
/// the pipeline can be rebuilt (e.g. on shader hot-reload) without the
/// caller re-supplying every field.
pub struct GraphicsPipelineDesc<'a> {
    pub label: &'a str,
    pub vertex_shader: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment_shader: &'a wgpu::ShaderModule,
    pub fragment_entry: &'a str,
    pub input_layout: InputLayout,
    pub binding_layouts: &'a [&'a BindingLayout],
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    pub cull_mode: Option<wgpu::Face>,
    pub topology: wgpu::PrimitiveTopology,
    /// Size in bytes of the pipeline's single push-constant root
    /// parameter (spec §4.6 "`PushConstants` becomes a 32-bit-constants
    /// root parameter (at most one per layout)"). `0` means the pipeline
    /// declares none, and `set_push_constants` against it is a contract
    /// violation.
    pub push_constant_size: u32,
}

pub struct GraphicsPipeline {
    raw: wgpu::RenderPipeline,
    push_constant_size: u32,
}

impl GraphicsPipeline {
    pub fn new(device: &Device, desc: GraphicsPipelineDesc<'_>) -> Self {
        let mut wgpu_attrs = Vec::new();
        let vertex_layout = desc.input_layout.to_wgpu(&mut wgpu_attrs);

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
            desc.binding_layouts.iter().map(|l| l.raw()).collect();
        let push_constant_ranges: &[wgpu::PushConstantRange] = if desc.push_constant_size > 0 {
            &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::VERTEX_FRAGMENT,
                range: 0..desc.push_constant_size,
            }]
        } else {
            &[]
        };
        let pipeline_layout = device
            .raw()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges,
            });

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: format.to_wgpu(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let depth_stencil = desc.depth_format.map(|format| wgpu::DepthStencilState {
            format: format.to_wgpu(),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let raw = device
            .raw()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: desc.vertex_shader,
                    entry_point: desc.vertex_entry,
                    buffers: &[vertex_layout],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: desc.fragment_shader,
                    entry_point: desc.fragment_entry,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    cull_mode: desc.cull_mode,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        Self {
            raw,
            push_constant_size: desc.push_constant_size,
        }
    }

    pub fn raw(&self) -> &wgpu::RenderPipeline {
        &self.raw
    }

    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

pub struct ComputePipeline {
    raw: wgpu::ComputePipeline,
    push_constant_size: u32,
}

impl ComputePipeline {
    pub fn new(
        device: &Device,
        label: &str,
        shader: &wgpu::ShaderModule,
        entry_point: &str,
        binding_layouts: &[&BindingLayout],
        push_constant_size: u32,
    ) -> Self {
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
            binding_layouts.iter().map(|l| l.raw()).collect();
        let push_constant_ranges: &[wgpu::PushConstantRange] = if push_constant_size > 0 {
            &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: 0..push_constant_size,
            }]
        } else {
            &[]
        };
        let pipeline_layout = device
            .raw()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges,
            });
        let raw = device
            .raw()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: shader,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });
        Self {
            raw,
            push_constant_size,
        }
    }

    pub fn raw(&self) -> &wgpu::ComputePipeline {
        &self.raw
    }

    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

/// A key into a pipeline cache, built from everything that affects a
/// pipeline's identity besides its shader bytecode (which is keyed
/// separately by the shader cache) — render-target format combination
/// and primitive topology, mirroring the teacher's pipeline-cache
/// keying in `renderer/pipeline/cache.rs`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineCacheKey {
    pub shader_id: u64,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
}

/// Caches built [`GraphicsPipeline`]s by [`PipelineCacheKey`] so a render
/// pass that runs every frame doesn't rebuild its pipeline object every
/// frame.
#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineCacheKey, Arc<GraphicsPipeline>>,
}

impl PipelineCache {
    pub fn get_or_insert_with(
        &mut self,
        key: PipelineCacheKey,
        build: impl FnOnce() -> GraphicsPipeline,
    ) -> Arc<GraphicsPipeline> {
        self.pipelines
            .entry(key)
            .or_insert_with(|| Arc::new(build()))
            .clone()
    }
}

/// A set of render-target attachments, resolved once per frame (or
/// whenever resized) and reused across the passes that render into it.
pub struct FrameBuffer {
    pub color_attachments: Vec<Arc<Texture>>,
    pub depth_attachment: Option<Arc<Texture>>,
    pub width: u32,
    pub height: u32,
}

impl FrameBuffer {
    pub fn color_formats(&self) -> Vec<Format> {
        self.color_attachments
            .iter()
            .filter_map(|t| Format::from_wgpu(t.desc().format.to_wgpu()))
            .collect()
    }
}
