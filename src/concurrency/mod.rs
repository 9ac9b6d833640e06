//! Concurrency core.
//!
//! A fixed-size worker thread pool, a lock-based MPSC job queue, a
//! task-DAG executor (`TaskFlow`) built on top of the pool, and
//! `parallel_for`/`parallel_for_2d` helpers used by the BVH builder and
//! scene baker to fan work out across the pool without hand-rolled
//! thread spawning at each call site.

mod parallel_for;
mod queue;
mod task_flow;
mod thread_pool;

pub use parallel_for::{parallel_for, parallel_for_2d};
pub use queue::MpscQueue;
pub use task_flow::{TaskFlow, TaskHandle};
pub use thread_pool::{JobHandle, ThreadPool};
