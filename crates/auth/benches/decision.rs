use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use portcullis_auth::{
    AccessControl, DispatchGuard, PermissionTable, Privileges, RequestContext, RoleGraph, RoleName, RoleRecord,
    UserRecord, Visitor,
};
use portcullis_core::UserId;

/// A single inheritance chain `role-0 <- role-1 <- ... <- role-{depth-1}`
/// where only the root is granted anything.
fn chain(depth: u64) -> AccessControl {
    let records: Vec<RoleRecord> = (0..depth)
        .map(|i| {
            let record = RoleRecord::new(i + 1, format!("role-{i}"));
            if i == 0 { record } else { record.with_parent(i) }
        })
        .collect();
    let graph = RoleGraph::load(records).expect("valid chain");
    let table = PermissionTable::builder(&graph)
        .resources(["user", "photo"])
        .allow(["guest"], ["user"], Privileges::only(["login"]))
        .expect("declared")
        .allow([RoleName::from("role-0")], ["user", "photo"], Privileges::only(["profile", "upload"]))
        .expect("declared")
        .build();
    AccessControl::new(graph, table)
}

fn leaf_visitor(depth: u64) -> Visitor {
    Visitor::with_roles(
        Some(UserRecord::new(UserId::new(1), "bench")),
        [RoleName::from(format!("role-{}", depth - 1))],
    )
}

fn bench_is_allowed(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_allowed");
    for depth in [1u64, 8, 64] {
        let access = chain(depth);
        let visitor = leaf_visitor(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| access.is_allowed(black_box(&visitor), black_box("photo"), black_box("upload")));
        });
    }
    group.finish();
}

fn bench_dispatch_denied(c: &mut Criterion) {
    let access = chain(16);
    let guard = DispatchGuard::default();
    let anonymous = Visitor::anonymous();
    let request = RequestContext::new("////evil.com/user/profile", "user", "profile");

    c.bench_function("dispatch_denied_anonymous", |b| {
        b.iter(|| guard.on_dispatch(black_box(&access), black_box(&anonymous), black_box(&request)));
    });
}

fn bench_graph_load(c: &mut Criterion) {
    let records: Vec<RoleRecord> = (0..256u64)
        .rev()
        .map(|i| {
            let record = RoleRecord::new(i + 1, format!("role-{i}"));
            if i == 0 { record } else { record.with_parent(i / 2 + 1) }
        })
        .collect();

    c.bench_function("graph_load_256_reversed", |b| {
        b.iter(|| RoleGraph::load(black_box(records.clone())).expect("valid tree"));
    });
}

criterion_group!(benches, bench_is_allowed, bench_dispatch_denied, bench_graph_load);
criterion_main!(benches);
