#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

//! A real-time rendering engine built around three tightly coupled
//! subsystems: a cross-queue [`rendergraph`], a COM-style [`rhi`]
//! (render-hardware interface) backed by `wgpu`, and a [`scene`] core
//! wrapping an [`ecs`] world, a [`bvh`] builder/simplifier, and a
//! distance-field / surface-cache baking pipeline. [`concurrency`]
//! supplies the thread pool and task-DAG executor everything else is
//! built on.
//!
//! Windowing, shader compilation, and glTF/image loading are
//! deliberately out of scope: this crate specifies trait seams for them
//! ([`rhi::backend::Window`], [`rhi::backend::ShaderCompiler`]) rather
//! than implementing them.

pub mod bvh;
pub mod concurrency;
pub mod ecs;
pub mod errors;
pub mod math;
pub mod rendergraph;
pub mod rhi;
pub mod scene;
pub mod timer;

pub use ecs::{ComponentTypeId, Entity, EventBus, System, World};
pub use errors::{EngineError, Result};
pub use rendergraph::{PassFlags, PassKind, RenderGraph, RenderPass};
pub use timer::FrameTimer;
