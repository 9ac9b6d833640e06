//! Render graph: a DAG of passes, compiled once (or whenever
//! dependencies change) into a topological order with per-queue command
//! list batching and cross-queue fence synchronization, then executed
//! every frame.
//!
//! The compile/execute algorithm is grounded directly on
//! `examples/original_source/Source/RenderGraph/src/RenderGraphImpl.cpp`:
//! Kahn's-algorithm topological sort with cycle detection, Wait/Signal
//! flag computation from adjacent passes' queue types, same-queue batch
//! submission, and the `Excluded`/`PendingExclude`/`Once`/`Regenerate`
//! precompute-pass lifecycle.

mod graph;
mod pass;
mod resource_cache;

pub use graph::RenderGraph;
pub use pass::{PassFlags, PassHandle, PassKind, RenderPass};
pub use resource_cache::ResourceCache;
