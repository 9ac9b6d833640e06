//! Benchmarks the render graph's `compile()` step (Kahn's-algorithm
//! topological sort + wait/signal flag derivation) over chain and
//! fan-out DAG shapes, since that's the cost every frame-one call to
//! `RenderGraph::compile` pays once up front.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use glint::errors::Result;
use glint::rendergraph::{PassHandle, PassKind, RenderGraph, RenderPass, ResourceCache};
use glint::rhi::CommandList;

struct NoopPass {
    kind: PassKind,
}

impl RenderPass for NoopPass {
    fn name(&self) -> &str {
        "noop"
    }

    fn kind(&self) -> PassKind {
        self.kind
    }

    fn compile(&mut self, _cache: &mut ResourceCache) -> Result<()> {
        Ok(())
    }

    fn execute(&self, _cache: &ResourceCache, _cmd: &mut CommandList) {}
}

fn build_chain(len: usize) -> RenderGraph {
    let mut graph = RenderGraph::new();
    let mut prev: Option<PassHandle> = None;
    for i in 0..len {
        let kind = if i % 3 == 0 { PassKind::Compute } else { PassKind::Graphics };
        let handle = graph.add_pass(NoopPass { kind });
        if let Some(p) = prev {
            graph.add_dependency(p, handle);
        }
        prev = Some(handle);
    }
    graph
}

fn build_fan_out(width: usize) -> RenderGraph {
    let mut graph = RenderGraph::new();
    let source = graph.add_pass(NoopPass { kind: PassKind::Graphics });
    let sink = graph.add_pass(NoopPass { kind: PassKind::Graphics });
    for i in 0..width {
        let kind = if i % 2 == 0 { PassKind::Compute } else { PassKind::Graphics };
        let mid = graph.add_pass(NoopPass { kind });
        graph.add_dependency(source, mid);
        graph.add_dependency(mid, sink);
    }
    graph
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_graph_compile");

    for len in [8usize, 64, 512] {
        group.bench_function(format!("chain_{len}"), |b| {
            b.iter_batched(
                || build_chain(len),
                |mut graph| graph.compile().unwrap(),
                BatchSize::SmallInput,
            );
        });
    }

    for width in [8usize, 64, 512] {
        group.bench_function(format!("fan_out_{width}"), |b| {
            b.iter_batched(
                || build_fan_out(width),
                |mut graph| graph.compile().unwrap(),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
