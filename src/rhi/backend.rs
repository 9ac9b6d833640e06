//! Trait seams for collaborators this crate deliberately does not
//! implement: windowing and shader compilation are out of scope (no
//! GLFW/winit-specific window layer, no DXC/HLSL front end), but the
//! render graph and device still need something to talk to in tests and
//! headless use. Each trait has a `Null*` test double.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// A presentable surface. Real implementations wrap a platform window
/// (winit, a headless offscreen target, etc); this crate only specifies
/// the contract.
pub trait Window: HasWindowHandle + HasDisplayHandle {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Compiles shader source into a `wgpu::ShaderModule`. Left as a trait
/// because real shader compilation (HLSL/DXC, or a WGSL front end with
/// `#include` resolution) is outside this crate's scope; render passes
/// depend on this trait, not on a concrete compiler, so they can be
/// exercised in tests against [`NullShaderCompiler`].
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule;
}

/// A shader "compiler" that ignores its source text and returns a fixed
/// pass-through WGSL module, for exercising render passes in tests
/// without a real shader toolchain.
pub struct NullShaderCompiler;

const NULL_SHADER_SOURCE: &str = r"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
";

impl ShaderCompiler for NullShaderCompiler {
    fn compile(&self, device: &wgpu::Device, label: &str, _source: &str) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(NULL_SHADER_SOURCE.into()),
        })
    }
}

/// Parses a glTF file into the flat submesh/material lists
/// `scene::mesh::ModelLoad` handling wraps into `Mesh`/`Material`
/// components. Real implementations wrap a glTF/GLB parser; this crate
/// only specifies the contract, matching the `Window`/`ShaderCompiler`
/// seams above.
pub trait GltfSource: Send + Sync {
    fn load(&self, path: &str) -> crate::errors::Result<crate::scene::mesh::LoadedModel>;
}

/// A `GltfSource` double that always reports the path as missing, for
/// exercising the model-load system's error path without a real parser.
pub struct NullGltfSource;

impl GltfSource for NullGltfSource {
    fn load(&self, path: &str) -> crate::errors::Result<crate::scene::mesh::LoadedModel> {
        Err(crate::errors::EngineError::AssetNotFound(path.to_string()))
    }
}

/// A headless `Window` double with a fixed extent and no real surface,
/// for exercising device/swapchain-adjacent code in tests.
pub struct NullWindow {
    width: u32,
    height: u32,
}

impl NullWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Window for NullWindow {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl HasWindowHandle for NullWindow {
    fn window_handle(
        &self,
    ) -> Result<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        Err(raw_window_handle::HandleError::NotSupported)
    }
}

impl HasDisplayHandle for NullWindow {
    fn display_handle(
        &self,
    ) -> Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError> {
        Err(raw_window_handle::HandleError::NotSupported)
    }
}
