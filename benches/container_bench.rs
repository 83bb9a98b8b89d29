//! Benchmarks for the autowire container

use autowire::{
    ArgumentSpec, ClassDescriptor, Container, ContainerBuilder, Definition, ObjectDefinition,
    ParamSpec,
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct Config {
    dsn: String,
}

#[allow(dead_code)]
struct Database {
    config: Arc<Config>,
}

#[allow(dead_code)]
struct Repository {
    db: Arc<Database>,
}

#[allow(dead_code)]
struct Service {
    repo: Arc<Repository>,
    name: String,
}

fn classes() -> ContainerBuilder {
    ContainerBuilder::new()
        .register_class(
            ClassDescriptor::builder::<Config>("Config")
                .constructor(vec![ParamSpec::scalar("dsn", "string")], |args| {
                    Ok(Config {
                        dsn: args.string(0)?,
                    })
                })
                .build(),
        )
        .register_class(
            ClassDescriptor::builder::<Database>("Database")
                .constructor(vec![ParamSpec::class("config", "Config")], |args| {
                    Ok(Database {
                        config: args.object::<Config>(0)?,
                    })
                })
                .build(),
        )
        .register_class(
            ClassDescriptor::builder::<Repository>("Repository")
                .constructor(vec![ParamSpec::class("db", "Database")], |args| {
                    Ok(Repository {
                        db: args.object::<Database>(0)?,
                    })
                })
                .build(),
        )
        .register_class(
            ClassDescriptor::builder::<Service>("Service")
                .constructor(
                    vec![
                        ParamSpec::class("repo", "Repository"),
                        ParamSpec::scalar("name", "string").with_default("service"),
                    ],
                    |args| {
                        Ok(Service {
                            repo: args.object::<Repository>(0)?,
                            name: args.string(1)?,
                        })
                    },
                )
                .build(),
        )
        .define(
            ObjectDefinition::autowire("Config")
                .constructor_arg("dsn", ArgumentSpec::value("postgres://localhost")),
        )
}

fn container() -> Container {
    classes()
        .define(Definition::value("app.name", "bench"))
        .define(Definition::alias("repo", "Repository"))
        .define(ObjectDefinition::new("service.proto", "Service").prototype())
        .build()
        .unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    group.bench_function("builder_4_classes", |b| {
        b.iter(|| black_box(container()))
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = container();
    container.get("Service").unwrap();

    group.bench_function("get_cached_singleton", |b| {
        b.iter(|| black_box(container.get("Service").unwrap()))
    });

    group.bench_function("get_value", |b| {
        b.iter(|| black_box(container.get("app.name").unwrap()))
    });

    group.bench_function("get_alias", |b| {
        b.iter(|| black_box(container.get("repo").unwrap()))
    });

    group.bench_function("get_prototype_autowired", |b| {
        b.iter(|| black_box(container.get("service.proto").unwrap()))
    });

    group.bench_function("has", |b| {
        b.iter(|| black_box(container.has("Repository")))
    });

    group.bench_function("has_missing", |b| {
        b.iter(|| black_box(container.has("Missing")))
    });

    group.finish();
}

fn bench_cold_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold");

    group.bench_function("resolve_4_level_graph", |b| {
        let container = container();
        b.iter(|| {
            container.reset();
            black_box(container.get("Service").unwrap())
        })
    });

    group.bench_function("make_fresh", |b| {
        let container = container();
        b.iter(|| black_box(container.make("Service", vec![]).unwrap()))
    });

    group.bench_function("lazy_proxy_create_and_force", |b| {
        let container = classes()
            .define(ObjectDefinition::autowire("Repository").lazy().prototype())
            .build()
            .unwrap();
        b.iter(|| {
            let value = container.get("Repository").unwrap();
            black_box(value.downcast::<Repository>().unwrap())
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = container();
        container.get("Service").unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get("Service").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_resolution,
    bench_cold_graph,
    bench_concurrent,
);

criterion_main!(benches);
