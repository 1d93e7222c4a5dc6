use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;

use authz_state::config::AuthzConfig;
use authz_state::storage::MemoryStore;
use authz_state::{AuthzManagerExternalState, LocalExternalState, NamespaceString, UserName, WriteConcern};

/// `n` roles in db "bench", each including up to `fanout` random roles with a lower
/// or higher index (so cycles appear), plus one user holding role 0.
fn build_state(n: usize, fanout: usize, seed: u64) -> LocalExternalState {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = AuthzConfig { default_schema_version: 2, ..AuthzConfig::default() };
    let state = LocalExternalState::with_store(Arc::new(MemoryStore::new()), config);
    state.initialize().ok();
    let wc = WriteConcern::default();
    for i in 0..n {
        let subs: Vec<_> = (0..rng.gen_range(0..=fanout))
            .map(|_| json!({"role": format!("r{}", rng.gen_range(0..n)), "db": "bench"}))
            .collect();
        let coll = format!("c{}", rng.gen_range(0..32));
        let doc = json!({
            "_id": format!("bench.r{}", i),
            "role": format!("r{}", i),
            "db": "bench",
            "roles": subs,
            "privileges": [{"resource": {"db": "bench", "collection": coll}, "actions": ["find", format!("act{}", i % 7)]}],
        });
        state.insert(&NamespaceString::admin_roles(), &doc, &wc).ok();
    }
    state
        .insert(
            &NamespaceString::admin_users(),
            &json!({"user": "u", "db": "bench", "credentials": {"x": 1}, "roles": [{"role": "r0", "db": "bench"}]}),
            &wc,
        )
        .ok();
    state
}

fn bench_resolve(c: &mut Criterion) {
    let sizes = [64usize, 512usize];
    let mut group = c.benchmark_group("describe_user");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &sizes {
        let state = build_state(n, 4, 0xA07A_5EED);
        let user = UserName::new("u", "bench");
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("random_graph", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let d = state.get_user_description(&user);
                criterion::black_box(&d);
            });
        });

        // Straight chain r0 -> r1 -> ... exercises the longest BFS frontier path
        let chain = LocalExternalState::with_store(
            Arc::new(MemoryStore::new()),
            AuthzConfig { default_schema_version: 2, ..AuthzConfig::default() },
        );
        let wc = WriteConcern::default();
        for i in 0..n {
            let subs = if i + 1 < n { vec![json!({"role": format!("r{}", i + 1), "db": "bench"})] } else { vec![] };
            chain
                .insert(
                    &NamespaceString::admin_roles(),
                    &json!({"_id": format!("bench.r{}", i), "role": format!("r{}", i), "db": "bench", "roles": subs, "privileges": []}),
                    &wc,
                )
                .ok();
        }
        group.bench_with_input(BenchmarkId::new("chain", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let d = chain.get_role_description(&authz_state::RoleName::new("r0", "bench"));
                criterion::black_box(&d);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
