use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::queue::MpscQueue;
use super::thread_pool::ThreadPool;

/// Index of a task within a [`TaskFlow`], returned by
/// [`TaskFlow::emplace`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(usize);

struct TaskNode {
    func: Option<Box<dyn FnMut() -> bool + Send>>,
    successors: Vec<usize>,
    /// How many predecessors must finish before this node is runnable.
    unfinished_dependents: AtomicUsize,
    /// Snapshot of the dependent count, restored after each run so the
    /// same flow can be re-executed without rebuilding it.
    unfinished_dependents_backup: usize,
}

/// A static task dependency DAG, executed on a [`ThreadPool`].
///
/// Tasks are emplaced once; dependencies are declared with
/// [`TaskFlow::precede`]. [`TaskFlow::run`] submits every source node (no
/// dependents) to the pool, then drains a completion queue: whenever a
/// node finishes, each of its successors has its unfinished-dependent
/// counter decremented, and any successor that reaches zero is submitted.
/// After a full run the counters are restored from their backup so the
/// same `TaskFlow` can be run again without re-declaring dependencies.
pub struct TaskFlow {
    nodes: Vec<TaskNode>,
}

impl TaskFlow {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Registers a task. The closure runs exactly once per [`TaskFlow::run`]
    /// and returns `true` on success; a `false` return is latched into
    /// `run`'s overall result without halting already-submitted sibling
    /// work, matching the pool's own no-preemption failure semantics.
    pub fn emplace<F>(&mut self, func: F) -> TaskHandle
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let index = self.nodes.len();
        self.nodes.push(TaskNode {
            func: Some(Box::new(func)),
            successors: Vec::new(),
            unfinished_dependents: AtomicUsize::new(0),
            unfinished_dependents_backup: 0,
        });
        TaskHandle(index)
    }

    /// Declares that `before` must finish before `after` starts.
    pub fn precede(&mut self, before: TaskHandle, after: TaskHandle) {
        self.nodes[before.0].successors.push(after.0);
        self.nodes[after.0].unfinished_dependents_backup += 1;
    }

    /// Removes every task and dependency, for rebuilding a flow from
    /// scratch (as opposed to re-running the same one).
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn reset_counters(&self) {
        for node in &self.nodes {
            node.unfinished_dependents.store(
                node.unfinished_dependents_backup,
                Ordering::Relaxed,
            );
        }
    }

    fn source_indices(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.unfinished_dependents_backup == 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Runs every task to completion on `pool`, respecting the declared
    /// dependency order, then blocks until the whole flow has drained.
    /// Returns `false` if any node returned `false`; sibling and
    /// already-submitted successor work still runs to completion rather
    /// than being cancelled (no preemption, matching [`ThreadPool`]'s own
    /// failure semantics).
    pub fn run(&mut self, pool: &ThreadPool) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        self.reset_counters();

        // Completion queue: worker jobs push their own (node index, result)
        // pair here when done; this thread drains it and submits
        // newly-runnable successors.
        let completed: Arc<MpscQueue<(usize, bool)>> = Arc::new(MpscQueue::new());
        let remaining = self.nodes.len();
        let successors: Vec<Vec<usize>> = self.nodes.iter().map(|n| n.successors.clone()).collect();

        // SAFETY: `self.nodes` outlives this function call, and no two
        // workers ever run the same index concurrently because a node is
        // submitted exactly once per run (its dependent counter only
        // reaches zero once).
        let nodes_ptr: *mut Vec<TaskNode> = &mut self.nodes;
        let nodes_ptr = nodes_ptr as usize;

        let submit_index = |index: usize, completed: Arc<MpscQueue<(usize, bool)>>| {
            pool.submit_detached(move || {
                let nodes: &mut Vec<TaskNode> = unsafe { &mut *(nodes_ptr as *mut Vec<TaskNode>) };
                let ok = match nodes[index].func.as_mut() {
                    Some(func) => func(),
                    None => true,
                };
                completed.push((index, ok));
                ok
            });
        };

        for src in self.source_indices() {
            submit_index(src, completed.clone());
        }

        let mut finished = 0usize;
        let mut all_ok = true;
        while finished < remaining {
            let (done_index, ok) = completed.pop();
            finished += 1;
            all_ok &= ok;
            for &succ in &successors[done_index] {
                let prev = self.nodes[succ]
                    .unfinished_dependents
                    .fetch_sub(1, Ordering::AcqRel);
                if prev == 1 {
                    submit_index(succ, completed.clone());
                }
            }
        }

        all_ok &= pool.wait_for_idle();
        all_ok
    }
}

impl Default for TaskFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    #[test]
    fn diamond_dependency_runs_in_order() {
        let pool = ThreadPool::new(4);
        let mut flow = TaskFlow::new();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let push = |order: Arc<Mutex<Vec<&'static str>>>, name: &'static str| {
            move || {
                order.lock().unwrap().push(name);
                true
            }
        };

        let a = flow.emplace(push(order.clone(), "a"));
        let b = flow.emplace(push(order.clone(), "b"));
        let c = flow.emplace(push(order.clone(), "c"));
        let d = flow.emplace(push(order.clone(), "d"));

        flow.precede(a, b);
        flow.precede(a, c);
        flow.precede(b, d);
        flow.precede(c, d);

        assert!(flow.run(&pool));

        let order = order.lock().unwrap();
        assert_eq!(order.first(), Some(&"a"));
        assert_eq!(order.last(), Some(&"d"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn flow_can_be_rerun() {
        let pool = ThreadPool::new(2);
        let mut flow = TaskFlow::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        flow.emplace(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(flow.run(&pool));
        assert!(flow.run(&pool));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_failing_node_sticks_run_to_false_but_still_drains() {
        let pool = ThreadPool::new(4);
        let mut flow = TaskFlow::new();
        let ran = Arc::new(AtomicU32::new(0));
        let ran_a = ran.clone();
        let ran_b = ran.clone();
        let a = flow.emplace(move || {
            ran_a.fetch_add(1, Ordering::SeqCst);
            false
        });
        let b = flow.emplace(move || {
            ran_b.fetch_add(1, Ordering::SeqCst);
            true
        });
        flow.precede(a, b);

        assert!(!flow.run(&pool));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}
