//! Dynamic render hardware interface (RHI).
//!
//! A COM-style ref-counted object model sits underneath every GPU
//! resource (buffer, texture, sampler, pipeline, descriptor heap, command
//! list). The concrete backend is [`wgpu`], which multiplexes the same
//! abstract surface this module exposes over Direct3D 12, Vulkan, and
//! Metal depending on the adapter selected at [`device::Device::new`]
//! time — see `SPEC_FULL.md` §12 for why this satisfies a "D3D12 plus
//! partial Vulkan" backend requirement without hand-written FFI.

pub mod backend;
pub mod binding;
pub mod buffer;
pub mod command_list;
pub mod descriptor;
pub mod device;
pub mod enums;
pub mod format;
pub mod object;
pub mod pipeline;
pub mod sampler;
pub mod texture;

pub use backend::{GltfSource, NullGltfSource, NullShaderCompiler, NullWindow, ShaderCompiler, Window};
pub use binding::{BindingKind, BindingLayout, BindingSet, BindingSlot, BindlessSet, BoundResource};
pub use buffer::{Buffer, BufferDesc, BufferUsage};
pub use command_list::CommandList;
pub use descriptor::{BitAllocator, DescriptorHeap};
pub use device::Device;
pub use enums::{QueueType, ResourceState, ShaderStage};
pub use format::Format;
pub use object::{Iid, Ref, RefCount, RhiObject};
pub use pipeline::{ComputePipeline, FrameBuffer, GraphicsPipeline, InputLayout};
pub use sampler::{Sampler, SamplerDesc};
pub use texture::{CpuAccess, StagingTexture, Texture, TextureDesc, TextureDimension, TextureUsage};
