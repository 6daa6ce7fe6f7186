//! Benchmarks for plan handling and execution with a scripted LM.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use htp_agent::context::{Knowledge, SolveContext};
use htp_agent::htp::Htp;
use htp_agent::lm::ScriptedLm;
use htp_agent::reasoner::BaseReasoner;
use htp_agent::resource::ResourceRegistry;

/// Root with `width` children, each with `width` leaf children.
fn wide_plan(width: usize) -> Htp {
    let children = (0..width)
        .map(|i| {
            let leaves = (0..width)
                .map(|j| Htp::leaf(format!("Step {i}.{j} for {{company}}")))
                .collect();
            Htp::leaf(format!("Part {i} for {{company}}")).with_sub_plans(leaves)
        })
        .collect();
    Htp::leaf("Assess {company}").with_sub_plans(children)
}

fn bench_execute(c: &mut Criterion) {
    let registry = ResourceRegistry::new();
    let knowledge = Knowledge::new();
    let ctx = SolveContext::new(&registry, &knowledge);
    let plan = wide_plan(8);

    c.bench_function("execute_8x8", |bench| {
        bench.iter_batched(
            || {
                let lm = Arc::new(ScriptedLm::new().with_fallback("ok"));
                (BaseReasoner::new(lm), plan.clone())
            },
            |(reasoner, mut plan)| black_box(plan.execute(&reasoner, &ctx, &[]).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_json(c: &mut Criterion) {
    let registry = ResourceRegistry::new();
    let plan = wide_plan(8);
    let json = plan.to_json(&registry).to_string();

    c.bench_function("from_json_8x8", |bench| {
        bench.iter(|| black_box(Htp::from_json_str(&json, &registry).unwrap()))
    });
}

fn bench_adapt(c: &mut Criterion) {
    let plan = wide_plan(8);
    let params = HashMap::from([("company".to_string(), "AMD".to_string())]);

    c.bench_function("adapt_8x8", |bench| {
        bench.iter(|| black_box(plan.adapt(&params)))
    });
}

criterion_group!(benches, bench_execute, bench_json, bench_adapt);
criterion_main!(benches);
