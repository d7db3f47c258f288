use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use injective::{
    instance, CreationMetadata, Export, InjectError, Injector, InjectiveConfig, MemoryLoader,
    RawModule, Resolved,
};

const LIB: &str = "/project/test/assets/lib";

#[derive(Debug)]
struct Named(&'static str);

#[derive(Debug, Default)]
struct Counter {
    value: AtomicUsize,
}

impl Counter {
    fn increment(&self) -> usize {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct Service {
    counter: Arc<Counter>,
    util: Arc<String>,
}

struct Fixture {
    injector: Injector,
    loader: Arc<MemoryLoader>,
    constructions: Arc<AtomicUsize>,
}

fn lib(name: &str) -> String {
    format!("{}/{}", LIB, name)
}

fn config() -> InjectiveConfig {
    InjectiveConfig::new()
        .with_base_path("/project")
        .with_path("my_util", "/test/assets/lib/util")
        .with_path("helpers", "./test/assets/lib")
        .with_bundle("group_a", ["./a", "./b"])
}

fn fixture() -> Fixture {
    let constructions = Arc::new(AtomicUsize::new(0));
    let loader = MemoryLoader::new()
        .with_latency(lib("a"), Duration::from_millis(30))
        .with_latency(lib("slow"), Duration::from_millis(20));

    let counted = constructions.clone();
    loader
        .define(lib("util/index"), RawModule::plain(Export::value("util".to_string())))
        .define("nice_util", RawModule::plain(Export::value("nice".to_string())))
        .define(
            lib("a"),
            RawModule::new(
                Export::constructor(|_| Ok(Named("a"))),
                CreationMetadata::constructor().singleton(),
            ),
        )
        .define(
            lib("b"),
            RawModule::new(
                Export::factory(|_| Ok(Named("b"))),
                CreationMetadata::factory(),
            ),
        )
        .define(
            lib("slow"),
            RawModule::new(
                Export::constructor(move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Named("slow"))
                }),
                CreationMetadata::constructor().singleton(),
            ),
        )
        .define(
            lib("counter"),
            RawModule::new(
                Export::factory(|_| Ok(Counter::default())),
                CreationMetadata::factory().singleton(),
            ),
        )
        .define(
            lib("fresh_counter"),
            RawModule::new(
                Export::factory(|_| Ok(Counter::default())),
                CreationMetadata::factory(),
            ),
        )
        .define(
            lib("pending"),
            RawModule::new(
                Export::async_factory(|_| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(1_i32)
                }),
                CreationMetadata::factory(),
            ),
        )
        .define(
            lib("service"),
            RawModule::new(
                Export::constructor(|deps| {
                    Ok(Service {
                        counter: deps.instance::<Counter>(0)?,
                        util: deps.instance::<String>(1)?,
                    })
                }),
                CreationMetadata::constructor()
                    .inject(["./counter", "my_util"])
                    .singleton(),
            ),
        )
        .define(
            lib("grouped"),
            RawModule::new(
                Export::factory(|deps| Ok(deps.bundle(0)?.len())),
                CreationMetadata::factory().inject(["group_a"]),
            ),
        )
        .define(
            lib("self_aware"),
            RawModule::new(
                Export::factory(|deps| Ok(deps.instance::<Injector>(0)?.depth())),
                CreationMetadata::factory().inject(["injective"]),
            ),
        )
        .define(
            lib("named"),
            RawModule::new(
                Export::factory(|_| Ok(Named("clock"))),
                CreationMetadata::factory().singleton().id("shared_clock"),
            ),
        )
        .define(
            lib("broken"),
            RawModule::new(
                Export::factory(|_| Err::<Named, _>("boom".into())),
                CreationMetadata::factory(),
            ),
        )
        .define(
            lib("needs_broken"),
            RawModule::new(
                Export::factory(|_| Ok(Named("unreachable"))),
                CreationMetadata::factory().inject(["./broken"]),
            ),
        )
        .define(
            lib("recovering"),
            RawModule::new(
                Export::factory(|_| Err::<Named, _>("boom".into())),
                CreationMetadata::factory()
                    .singleton()
                    .on_error(|_| Ok(instance("fallback".to_string()))),
            ),
        )
        .define(
            lib("rethrowing"),
            RawModule::new(
                Export::factory(|_| Err::<Named, _>("boom".into())),
                CreationMetadata::factory().on_error(Err),
            ),
        )
        .define(
            lib("odd"),
            RawModule::new(
                Export::value(Named("odd")),
                CreationMetadata::with_kind("prototype"),
            ),
        )
        .define(
            lib("mismatched"),
            RawModule::new(Export::value(Named("value")), CreationMetadata::factory()),
        )
        .define(
            lib("cycle_a"),
            RawModule::new(
                Export::factory(|_| Ok(Named("cycle_a"))),
                CreationMetadata::factory().inject(["./cycle_b"]),
            ),
        )
        .define(
            lib("cycle_b"),
            RawModule::new(
                Export::factory(|_| Ok(Named("cycle_b"))),
                CreationMetadata::factory().inject(["./cycle_a"]),
            ),
        )
        .define(
            lib("outer"),
            RawModule::new(
                Export::factory(|_| Ok(Named("outer"))),
                CreationMetadata::factory()
                    .inject(["./inner"])
                    .singleton()
                    .id("svc"),
            ),
        )
        .define(
            lib("inner"),
            RawModule::new(
                Export::factory(|_| Ok(Named("inner"))),
                CreationMetadata::factory().singleton().id("svc"),
            ),
        )
        .define(
            lib("sub/nested"),
            RawModule::new(
                Export::factory(|deps| Ok(deps.instance::<String>(0)?.len())),
                CreationMetadata::factory().inject(["./sibling"]),
            ),
        )
        .define(
            lib("sub/sibling"),
            RawModule::plain(Export::value("sub/sibling".to_string())),
        );

    let loader = Arc::new(loader);
    let injector = Injector::new(config(), loader.clone()).with_origin(LIB);
    Fixture {
        injector,
        loader,
        constructions,
    }
}

fn named(resolved: &Resolved) -> &'static str {
    resolved.downcast::<Named>().unwrap().0
}

#[tokio::test]
async fn test_set_get_resolve_return_identical_instance() {
    let injector = fixture().injector;
    injector.set("settings", Named("settings"));

    let stored = injector.get("settings").unwrap();
    for _ in 0..3 {
        let resolved = injector.resolve("settings").await.unwrap();
        assert!(Arc::ptr_eq(resolved.as_instance().unwrap(), &stored));
        assert!(Arc::ptr_eq(&injector.get("settings").unwrap(), &stored));
    }
}

#[tokio::test]
async fn test_child_reads_parent_but_writes_stay_local() {
    let parent = fixture().injector;
    parent.set("x", Named("parent"));
    let child = parent.create();

    assert!(child.has("x"));
    let from_child = child.resolve("x").await.unwrap();
    assert!(Arc::ptr_eq(from_child.as_instance().unwrap(), &parent.get("x").unwrap()));

    child.set("x", Named("child"));
    assert_eq!(parent.get_as::<Named>("x").unwrap().0, "parent");
    assert_eq!(child.get_as::<Named>("x").unwrap().0, "child");

    child.set("only_child", Named("child"));
    assert!(!parent.has("only_child"));
}

#[tokio::test]
async fn test_delete_of_ancestor_entry_is_a_silent_noop() {
    let parent = fixture().injector;
    parent.set("x", Named("parent"));
    let child = parent.create();

    assert!(!child.delete("x"));
    assert!(child.has("x"));
    assert!(parent.delete("x"));
    assert!(!child.has("x"));
}

#[tokio::test]
async fn test_alias_resolves_util_module() {
    let injector = fixture().injector;
    let util = injector.resolve("my_util").await.unwrap();
    assert_eq!(*util.downcast::<String>().unwrap(), "util");

    let index = injector.resolve("my_util/index").await.unwrap();
    assert!(util.ptr_eq(&index));
}

#[tokio::test]
async fn test_root_relative_and_relative_alias_names() {
    let injector = fixture().injector;

    let rooted = injector.resolve("/test/assets/lib/b").await.unwrap();
    assert_eq!(named(&rooted), "b");

    let aliased = injector.resolve("helpers/b").await.unwrap();
    assert_eq!(named(&aliased), "b");

    let relative = injector.resolve("./b").await.unwrap();
    assert_eq!(named(&relative), "b");
}

#[tokio::test]
async fn test_unmatched_name_falls_back_to_library_identifier() {
    let injector = fixture().injector;
    let nice = injector.resolve("nice_util").await.unwrap();
    assert_eq!(*nice.downcast::<String>().unwrap(), "nice");

    let err = injector.resolve("no_such_library").await.unwrap_err();
    assert!(err.is_resolution());
    assert!(matches!(err, InjectError::Resolution { ref name, .. } if name == "no_such_library"));
}

#[tokio::test]
async fn test_bundle_keeps_declared_order_despite_latency() {
    let injector = fixture().injector;
    let group = injector.resolve("group_a").await.unwrap();

    let members = group.as_bundle().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(named(&members[0]), "a");
    assert_eq!(named(&members[1]), "b");
}

#[tokio::test]
async fn test_bundle_second_resolution_reuses_only_singletons() {
    let injector = fixture().injector;
    let first = injector.resolve("group_a").await.unwrap().into_bundle().unwrap();
    let second = injector.resolve("group_a").await.unwrap().into_bundle().unwrap();

    assert!(first[0].ptr_eq(&second[0]));
    assert!(!first[1].ptr_eq(&second[1]));
}

#[tokio::test]
async fn test_bundle_as_dependency_is_passed_as_sequence() {
    let injector = fixture().injector;
    let count = injector.resolve_as::<usize>("./grouped").await.unwrap();
    assert_eq!(*count, 2);
}

#[tokio::test]
async fn test_pending_factory_result_is_unwrapped() {
    let injector = fixture().injector;
    let value = injector.resolve_as::<i32>("./pending").await.unwrap();
    assert_eq!(*value, 1);
}

#[tokio::test]
async fn test_singleton_counter_keeps_state_per_lineage() {
    let root = fixture().injector;
    let left = root.create();
    let right = root.create();

    let left_counter = left.resolve_as::<Counter>("./counter").await.unwrap();
    assert_eq!(left_counter.increment(), 1);
    assert_eq!(left_counter.increment(), 2);

    let again = left.resolve_as::<Counter>("./counter").await.unwrap();
    assert!(Arc::ptr_eq(&left_counter, &again));
    assert_eq!(again.increment(), 3);

    let right_counter = right.resolve_as::<Counter>("./counter").await.unwrap();
    assert!(!Arc::ptr_eq(&left_counter, &right_counter));
    assert_eq!(right_counter.increment(), 1);

    // 单例写在子层，根上下文看不到
    assert!(!root.has(&lib("counter")));
    assert!(left.has(&lib("counter")));
}

#[tokio::test]
async fn test_singleton_cached_in_parent_is_shared_by_children() {
    let root = fixture().injector;
    let from_root = root.resolve_as::<Counter>("./counter").await.unwrap();
    let from_child = root.create().resolve_as::<Counter>("./counter").await.unwrap();
    assert!(Arc::ptr_eq(&from_root, &from_child));
}

#[tokio::test]
async fn test_non_singleton_factory_creates_fresh_instances() {
    let injector = fixture().injector;
    let first = injector.resolve_as::<Counter>("./fresh_counter").await.unwrap();
    let second = injector.resolve_as::<Counter>("./fresh_counter").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.increment(), 1);
    assert_eq!(second.increment(), 1);
}

#[tokio::test]
async fn test_resolve_many_returns_same_singleton() {
    let injector = fixture().injector;
    let resolved = injector
        .resolve_many(["./counter", "./counter", "./b"])
        .await
        .unwrap();

    assert_eq!(resolved.len(), 3);
    assert!(resolved[0].ptr_eq(&resolved[1]));
    assert_eq!(named(&resolved[2]), "b");
}

#[tokio::test]
async fn test_constructor_receives_dependencies_in_order() {
    let injector = fixture().injector;
    let service = injector.resolve_as::<Service>("./service").await.unwrap();
    let counter = injector.resolve_as::<Counter>("./counter").await.unwrap();

    assert!(Arc::ptr_eq(&service.counter, &counter));
    assert_eq!(*service.util, "util");
}

#[tokio::test]
async fn test_reserved_name_resolves_to_requesting_context() {
    let root = fixture().injector;
    let child = root.create();

    let resolved = child.resolve_as::<Injector>("injective").await.unwrap();
    assert_eq!(resolved.depth(), 1);

    let depth = child.resolve_as::<usize>("./self_aware").await.unwrap();
    assert_eq!(*depth, 1);
    let depth = root.resolve_as::<usize>("./self_aware").await.unwrap();
    assert_eq!(*depth, 0);
}

#[tokio::test]
async fn test_id_overrides_singleton_cache_key() {
    let injector = fixture().injector;
    let clock = injector.resolve("./named").await.unwrap();

    assert!(injector.has("shared_clock"));
    assert!(!injector.has(&lib("named")));
    let cached = injector.resolve("shared_clock").await.unwrap();
    assert!(clock.ptr_eq(&cached));
}

#[tokio::test]
async fn test_id_singleton_location_is_loaded_once() {
    let Fixture { injector, loader, .. } = fixture();
    let first = injector.resolve("./named").await.unwrap();
    let second = injector.resolve("./named").await.unwrap();
    let from_child = injector.create().resolve("./named").await.unwrap();

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&from_child));
    assert_eq!(loader.load_count(&lib("named")), 1);
}

#[tokio::test]
async fn test_nested_singleton_with_same_id_fails_instead_of_hanging() {
    let injector = fixture().injector;
    let outcome = tokio::time::timeout(Duration::from_secs(2), injector.resolve("./outer"))
        .await
        .expect("resolution must not block on its own singleton slot");

    let err = outcome.unwrap_err();
    assert!(matches!(err.root_cause(), InjectError::CircularDependency { .. }));
    assert_eq!(err.dependency_chain(), vec![lib("outer").as_str(), "./inner"]);
    assert!(!injector.has("svc"));
}

#[tokio::test]
async fn test_module_dependencies_resolve_against_module_directory() {
    let injector = fixture().injector;
    assert_eq!(injector.origin(), LIB);

    // `./sibling` 只存在于嵌套模块所在的目录，上下文起点下没有它
    let len = injector.resolve_as::<usize>("./sub/nested").await.unwrap();
    assert_eq!(*len, "sub/sibling".len());
    assert!(injector.resolve("./sibling").await.unwrap_err().is_resolution());
}

#[tokio::test]
async fn test_registry_precedes_path_resolution() {
    let injector = fixture().injector;
    injector.register(
        "my_util",
        Export::factory(|_| Ok("registered".to_string())),
        CreationMetadata::factory(),
    );

    let util = injector.resolve_as::<String>("my_util").await.unwrap();
    assert_eq!(*util, "registered");

    assert!(injector.deregister("my_util"));
    let util = injector.resolve_as::<String>("my_util").await.unwrap();
    assert_eq!(*util, "util");
}

#[tokio::test]
async fn test_registered_singleton_is_cached_under_its_name() {
    let injector = fixture().injector;
    injector.register(
        "clock",
        Export::constructor(|_| Ok(Counter::default())),
        CreationMetadata::constructor().singleton(),
    );

    let first = injector.resolve_as::<Counter>("clock").await.unwrap();
    let second = injector.resolve_as::<Counter>("clock").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(injector.has("clock"));
}

#[tokio::test]
async fn test_on_error_recovers_without_caching() {
    let injector = fixture().injector;
    let value = injector.resolve_as::<String>("./recovering").await.unwrap();
    assert_eq!(*value, "fallback");
    assert!(!injector.has(&lib("recovering")));
    assert_eq!(injector.stats().recovered_errors, 1);

    let err = injector.resolve("./rethrowing").await.unwrap_err();
    assert!(err.is_instantiation());
}

#[tokio::test]
async fn test_unknown_creation_kind_is_rejected() {
    let injector = fixture().injector;
    let err = injector.resolve("./odd").await.unwrap_err();
    assert!(matches!(
        err,
        InjectError::UnknownCreationKind { ref kind, ref location }
            if kind == "prototype" && location == &lib("odd")
    ));
}

#[tokio::test]
async fn test_export_must_match_creation_kind() {
    let injector = fixture().injector;
    let err = injector.resolve("./mismatched").await.unwrap_err();
    assert!(err.is_instantiation());
}

#[tokio::test]
async fn test_dependency_failure_keeps_lineage() {
    let injector = fixture().injector;
    let err = injector.resolve("./needs_broken").await.unwrap_err();

    let needs_broken = lib("needs_broken");
    assert_eq!(err.dependency_chain(), vec![needs_broken.as_str(), "./broken"]);
    assert!(err.is_instantiation());
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn test_circular_dependency_is_detected() {
    let injector = fixture().injector;
    let err = injector.resolve("./cycle_a").await.unwrap_err();

    match err.root_cause() {
        InjectError::CircularDependency { chain } => {
            assert_eq!(chain, &[lib("cycle_a"), lib("cycle_b"), lib("cycle_a")]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_singleton_resolution_creates_once() {
    let Fixture {
        injector,
        loader,
        constructions,
    } = fixture();

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let injector = injector.clone();
            tokio::spawn(async move { injector.resolve("./slow").await })
        })
        .collect();

    let results: Vec<Resolved> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|resolved| resolved.ptr_eq(&results[0])));
    assert_eq!(loader.load_count(&lib("slow")), 1);
    assert_eq!(injector.stats().instantiations, 1);
}

#[tokio::test]
async fn test_stats_track_hits_and_instantiations() {
    let injector = fixture().injector;
    injector.resolve("./counter").await.unwrap();
    injector.resolve("./counter").await.unwrap();

    let stats = injector.stats();
    assert_eq!(stats.instantiations, 1);
    assert_eq!(stats.cache_hits, 1);
    assert!(stats.hit_rate() > 0.0);
}
