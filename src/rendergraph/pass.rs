use bitflags::bitflags;

use crate::errors::Result;
use crate::rhi::{CommandList, QueueType};

use super::resource_cache::ResourceCache;

/// A pass's hardware-queue classification. Distinct from [`PassFlags`]:
/// a pass's `PassKind` never changes across its lifetime, while its
/// flags are mutated frame to frame by [`super::graph::RenderGraph::execute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    Graphics,
    Compute,
    /// A pass that produces data consumed by later passes but has no
    /// per-frame output of its own once it has run — e.g. baking a
    /// distance field or surface-cache atlas. Precompute passes combine
    /// with [`PassFlags::ONCE`]/[`PassFlags::REGENERATE`] to run on
    /// demand rather than every frame.
    Precompute,
}

impl PassKind {
    pub fn queue_type(self) -> QueueType {
        match self {
            PassKind::Graphics => QueueType::Graphics,
            PassKind::Compute | PassKind::Precompute => QueueType::Compute,
        }
    }
}

bitflags! {
    /// Per-pass lifecycle flags, mutated by [`super::graph::RenderGraph::execute`]
    /// each frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PassFlags: u32 {
        /// Skipped entirely by `execute` — neither compiled nor run.
        const EXCLUDED = 1 << 0;
        /// Runs one more time, then becomes `EXCLUDED` next frame.
        const PENDING_EXCLUDE = 1 << 1;
        /// Runs exactly once: after running, becomes `PENDING_EXCLUDE`.
        const ONCE = 1 << 2;
        /// Asks to be re-run: `execute` clears this pass's output state
        /// and retries it next frame without submitting this frame's
        /// (discarded) command list.
        const REGENERATE = 1 << 3;
        /// Set by `compile` when a predecessor pass runs on a different
        /// queue: this pass's command list must wait for that queue to
        /// reach the predecessor's submission before starting.
        const WAIT = 1 << 4;
        /// Set by `compile` when a successor pass runs on a different
        /// queue: this pass's batch must be flushed (and a fence
        /// recorded) immediately after it runs, rather than batched with
        /// the next same-queue pass.
        const SIGNAL = 1 << 5;
    }
}

/// Opaque handle to a pass registered with a [`super::graph::RenderGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassHandle(pub(crate) usize);

/// A single render graph node.
///
/// `compile` runs once per graph compilation (not every frame) and is
/// where a pass should declare/require its resources against the
/// [`ResourceCache`]. `execute` runs every frame a pass isn't
/// [`PassFlags::EXCLUDED`] and records GPU work into `cmd`.
pub trait RenderPass: Send {
    fn name(&self) -> &str;
    fn kind(&self) -> PassKind;

    /// Declares/resolves the resources this pass reads and writes.
    /// Called once at graph compile time, in topological order, so a
    /// pass can `require` something an earlier pass `collect`ed.
    fn compile(&mut self, cache: &mut ResourceCache) -> Result<()>;

    /// Records this frame's GPU work.
    fn execute(&self, cache: &ResourceCache, cmd: &mut CommandList);

    /// Called once the pass's command list has been submitted for the
    /// frame; used for any CPU-side bookkeeping (e.g. swapping a
    /// double-buffered readback).
    fn finish_pass(&mut self) {}
}
