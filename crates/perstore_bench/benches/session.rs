//! Session and query benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use perstore_bench::generate_users;
use perstore_core::{Config, SessionFactory};
use perstore_testkit::fixtures::TestUser;

fn seeded_factory(count: usize) -> SessionFactory {
    let factory = SessionFactory::open_in_memory().expect("open factory");
    let mut session = factory.open_session().expect("open session");
    for user in generate_users(count) {
        session.persist(&user).expect("persist");
    }
    session.commit().expect("commit");
    factory
}

/// Benchmark persist + commit batches of various sizes.
fn bench_persist_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("persist_commit");

    for batch in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let factory = SessionFactory::open_in_memory().expect("open factory");
            b.iter(|| {
                let mut session = factory.open_session().expect("open session");
                for user in generate_users(batch) {
                    session.persist(black_box(&user)).expect("persist");
                }
                session.commit().expect("commit");
            });
        });
    }

    group.finish();
}

/// Benchmark finds through the cache and past it.
fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    let factory = seeded_factory(1000);
    let id = {
        let mut session = factory.open_session().expect("open session");
        let users: Vec<TestUser> = session
            .query::<TestUser>()
            .max_results(1)
            .list()
            .expect("list");
        users[0].id
    };

    group.bench_function("cached", |b| {
        b.iter(|| {
            let mut session = factory.open_session().expect("open session");
            let found: Option<TestUser> = session.find(black_box(id)).expect("find");
            black_box(found);
        });
    });

    let uncached = SessionFactory::open_in_memory_with_config(
        Config::new().use_second_level_cache(false),
    )
    .expect("open factory");
    {
        let mut session = uncached.open_session().expect("open session");
        for user in generate_users(1000) {
            session.persist(&user).expect("persist");
        }
        session.commit().expect("commit");
    }
    group.bench_function("uncached", |b| {
        b.iter(|| {
            let mut session = uncached.open_session().expect("open session");
            let found: Option<TestUser> = session.find(black_box(id)).expect("find");
            black_box(found);
        });
    });

    group.finish();
}

/// Benchmark full-collection query scans.
fn bench_query_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_scan");

    for size in [100usize, 1000] {
        let factory = seeded_factory(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut session = factory.open_session().expect("open session");
                let n = session
                    .query::<TestUser>()
                    .filter(|u| u.admin)
                    .count()
                    .expect("count");
                black_box(n);
            });
        });
    }

    group.finish();
}

/// Benchmark dirty checking: load many entities, change one, flush.
fn bench_flush_dirty_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");

    let factory = seeded_factory(500);
    group.bench_function("dirty_check_500_loaded", |b| {
        b.iter(|| {
            let mut session = factory.open_session().expect("open session");
            let users: Vec<TestUser> = session.query::<TestUser>().list().expect("list");
            session
                .modify::<TestUser>(users[0].id, |u| u.admin = !u.admin)
                .expect("modify");
            session.flush().expect("flush");
            session.rollback().expect("rollback");
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_persist_commit,
    bench_find,
    bench_query_scan,
    bench_flush_dirty_check
);
criterion_main!(benches);
