//! 分层依赖注入上下文
//!
//! [`Injector`] 是一个廉价可克隆的句柄：配置、注册表、加载器与统计信息由整条
//! 上下文谱系共享；实例缓存按层隔离，子上下文可以读取祖先的条目，
//! 但写入永远不会向上传播。

mod engine;
mod registry;
mod scope;

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use self::registry::Registry;
use self::scope::Scope;
use super::loader::ModuleLoader;
use super::module::{CreationMetadata, Export, Instance, RawModule};
use super::path_resolver::{Location, PathResolver};
use crate::config::InjectiveConfig;
use crate::errors::InjectError;

/// 保留名称：解析为发起解析的上下文本身
pub const SELF_REFERENCE: &str = "injective";

/// 依赖注入上下文
#[derive(Clone)]
pub struct Injector {
    shared: Arc<Shared>,
    scope: Arc<Scope>,
    /// 相对名称的解析起点
    origin: Arc<str>,
}

/// 整条谱系共享的部分
struct Shared {
    resolver: PathResolver,
    loader: Arc<dyn ModuleLoader>,
    registry: Registry,
    /// 每个规范位置只加载一次；并发加载同一位置时共享同一个槽
    modules: DashMap<String, Arc<OnceCell<RawModule>>>,
    stats: InnerStats,
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    instantiations: AtomicUsize,
    recovered_errors: AtomicUsize,
}

impl InnerStats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> InjectorStats {
        InjectorStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            instantiations: self.instantiations.load(Ordering::Relaxed),
            recovered_errors: self.recovered_errors.load(Ordering::Relaxed),
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorStats {
    /// 名称解析次数（含递归依赖）
    pub total_resolutions: usize,
    pub cache_hits: usize,
    /// 需要经过加载器或注册表的解析
    pub cache_misses: usize,
    /// 工厂或构造器被调用的次数
    pub instantiations: usize,
    /// 被 `on_error` 回调吸收的失败
    pub recovered_errors: usize,
}

impl InjectorStats {
    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl Injector {
    /// 创建根上下文；相对名称默认以 `base_path`（缺省为 `/`）为起点
    pub fn new(config: InjectiveConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        let origin = config.base_path.clone().unwrap_or_else(|| "/".to_string());
        Self {
            shared: Arc::new(Shared {
                resolver: PathResolver::new(config),
                loader,
                registry: Registry::new(),
                modules: DashMap::new(),
                stats: InnerStats::default(),
            }),
            scope: Arc::new(Scope::root()),
            origin: Arc::from(origin),
        }
    }

    /// 指定相对名称的解析起点
    pub fn with_origin(mut self, origin: impl AsRef<str>) -> Self {
        self.origin = Arc::from(origin.as_ref());
        self
    }

    /// 派生子上下文：共享配置与注册表，缓存读穿到本上下文，写入只落在子层
    pub fn create(&self) -> Self {
        tracing::debug!("Creating new context at depth {}", self.scope.depth() + 1);
        Self {
            shared: self.shared.clone(),
            scope: Arc::new(Scope::child(&self.scope)),
            origin: self.origin.clone(),
        }
    }

    /// 在本层定义实例（总是单例语义）
    pub fn set<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> &Self {
        self.set_instance(name, Arc::new(value))
    }

    /// 在本层定义已包装好的实例
    pub fn set_instance(&self, name: impl Into<String>, value: Instance) -> &Self {
        let name = name.into();
        tracing::debug!("Defining instance for {}", name);
        self.scope.insert(name, value);
        self
    }

    /// 沿谱系查找缓存的实例，从不失败
    pub fn get(&self, name: &str) -> Option<Instance> {
        self.scope.lookup(name)
    }

    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|value| value.downcast::<T>().ok())
    }

    pub fn has(&self, name: &str) -> bool {
        self.scope.lookup(name).is_some()
    }

    /// 只删除本层拥有的条目；名称只存在于祖先层时返回 `false`
    pub fn delete(&self, name: &str) -> bool {
        self.scope.remove(name)
    }

    /// 登记生产者，在路径解析之前被查询
    pub fn register(
        &self,
        name: impl Into<String>,
        producer: Export,
        metadata: CreationMetadata,
    ) -> &Self {
        self.shared.registry.register(name, producer, metadata);
        self
    }

    pub fn deregister(&self, name: &str) -> bool {
        self.shared.registry.deregister(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.shared.registry.contains(name)
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.shared.registry.names()
    }

    /// 只做路径解析，不加载也不实例化
    pub fn locate(&self, name: &str) -> Result<Location, InjectError> {
        self.shared
            .resolver
            .resolve(name, &self.origin, self.shared.loader.as_ref())
    }

    pub fn config(&self) -> &InjectiveConfig {
        self.shared.resolver.config()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// 根上下文为 0
    pub fn depth(&self) -> usize {
        self.scope.depth()
    }

    /// 本层自有的条目名称
    pub fn local_names(&self) -> Vec<String> {
        let mut names = self.scope.local_keys();
        names.sort();
        names
    }

    pub fn stats(&self) -> InjectorStats {
        self.shared.stats.snapshot()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("depth", &self.depth())
            .field("origin", &self.origin)
            .field("local", &self.local_names())
            .finish()
    }
}
