//! 解析与实例化
//!
//! 解析顺序：保留名 → 缓存谱系 → 注册表 → 路径解析（bundle 逐项递归）→
//! 加载器 → 按创建元数据实例化 → 单例写回当前层。依赖列表与 bundle 严格
//! 按声明顺序逐个解析，后面的依赖可以观察到前面依赖产生的单例。

use futures_util::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{InnerStats, Injector, SELF_REFERENCE};
use crate::errors::InjectError;
use crate::infrastructure::module::{
    Creatable, CreationKind, Dependencies, Export, Instance, Loadable, RawModule, Resolved,
};
use crate::infrastructure::path_resolver::Target;

/// 当前解析路径上的位置与 bundle，用于检测循环依赖
#[derive(Debug, Clone, Default)]
struct ResolutionPath(Vec<String>);

impl ResolutionPath {
    fn enter(&self, key: &str) -> Result<ResolutionPath, InjectError> {
        let mut chain = self.0.clone();
        chain.push(key.to_string());
        if self.0.iter().any(|entry| entry == key) {
            return Err(InjectError::CircularDependency { chain });
        }
        Ok(ResolutionPath(chain))
    }

    /// 单例缓存键也记入路径，同一个键在创建过程中再次出现即为循环
    fn enter_singleton(&self, key: &str) -> Result<ResolutionPath, InjectError> {
        self.enter(&format!("singleton:{}", key))
    }
}

impl Injector {
    /// 解析单个逻辑名称
    pub async fn resolve(&self, name: &str) -> Result<Resolved, InjectError> {
        let path = ResolutionPath::default();
        self.resolve_name(name, &self.origin, &path).await
    }

    /// 按顺序逐个解析多个名称，结果保持声明顺序
    pub async fn resolve_many<I, S>(&self, names: I) -> Result<Vec<Resolved>, InjectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        let mut resolved = Vec::with_capacity(names.len());
        for name in &names {
            resolved.push(self.resolve(name.as_ref()).await?);
        }
        Ok(resolved)
    }

    /// 解析并向下转型为 `T`
    pub async fn resolve_as<T: Any + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, InjectError> {
        self.resolve(name)
            .await?
            .into_instance()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| InjectError::type_mismatch(name, std::any::type_name::<T>()))
    }

    fn resolve_name<'a>(
        &'a self,
        name: &'a str,
        origin: &'a str,
        path: &'a ResolutionPath,
    ) -> BoxFuture<'a, Result<Resolved, InjectError>> {
        Box::pin(async move {
            InnerStats::bump(&self.shared.stats.total_resolutions);

            if name == SELF_REFERENCE {
                return Ok(Resolved::Instance(Arc::new(self.clone())));
            }

            if let Some(hit) = self.cached(name) {
                return Ok(Resolved::Instance(hit));
            }

            if let Some(raw) = self.shared.registry.get(name) {
                debug!("Instantiating registered producer {}", name);
                InnerStats::bump(&self.shared.stats.cache_misses);
                let path = path.enter(name)?;
                return self
                    .materialize(raw, name, &self.origin, &path)
                    .await
                    .map(Resolved::Instance);
            }

            match self.shared.resolver.expand(name) {
                Target::Bundle(members) => {
                    let path = path.enter(name)?;
                    let mut resolved = Vec::with_capacity(members.len());
                    for member in members {
                        let value = self
                            .resolve_name(member, origin, &path)
                            .await
                            .map_err(|source| InjectError::Dependency {
                                dependent: name.to_string(),
                                dependency: member.clone(),
                                source: Box::new(source),
                            })?;
                        resolved.push(value);
                    }
                    Ok(Resolved::Bundle(resolved))
                }
                Target::Symbolic(symbolic) => self
                    .resolve_symbolic(name, &symbolic, origin, path)
                    .await
                    .map(Resolved::Instance),
            }
        })
    }

    async fn resolve_symbolic(
        &self,
        name: &str,
        symbolic: &str,
        origin: &str,
        path: &ResolutionPath,
    ) -> Result<Instance, InjectError> {
        if symbolic != name {
            if let Some(hit) = self.cached(symbolic) {
                return Ok(hit);
            }
        }

        let loader = self.shared.loader.as_ref();
        let location = self
            .shared
            .resolver
            .canonicalize(name, symbolic, origin, loader)?;
        debug!("Resolved {} -> {}", name, location);

        if let Some(hit) = self.cached(&location) {
            return Ok(hit);
        }

        let path = path.enter(&location)?;
        InnerStats::bump(&self.shared.stats.cache_misses);
        let raw = self.load_once(name, &location).await?;

        let module_origin = loader.origin_of(&location);
        self.materialize(raw, &location, &module_origin, &path).await
    }

    /// 同一规范位置在整条谱系内只交给加载器一次，失败不会被记住
    async fn load_once(&self, name: &str, location: &str) -> Result<RawModule, InjectError> {
        let cell = self
            .shared
            .modules
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let raw = cell
            .get_or_try_init(|| async move {
                debug!("Loading module {}", location);
                self.shared
                    .loader
                    .load(location)
                    .await
                    .map_err(|cause| InjectError::Resolution {
                        name: name.to_string(),
                        cause,
                    })
            })
            .await?;
        Ok(raw.clone())
    }

    /// 加载后钩子：归类原始模块并按需实例化
    async fn materialize(
        &self,
        raw: RawModule,
        location: &str,
        origin: &str,
        path: &ResolutionPath,
    ) -> Result<Instance, InjectError> {
        let creatable = match Loadable::classify(raw, location)? {
            Loadable::Plain {
                value,
                dependencies,
            } => {
                if !dependencies.is_empty() {
                    self.resolve_dependencies(location, &dependencies, origin, path)
                        .await?;
                }
                debug!("Using raw export of {}", location);
                return Ok(value);
            }
            Loadable::Creatable(creatable) => creatable,
        };
        let creatable = &creatable;

        let outcome = if creatable.singleton {
            let key = creatable.id.as_deref().unwrap_or(location);
            if let Some(hit) = self.cached(key) {
                return Ok(hit);
            }
            let path = &path.enter_singleton(key)?;

            // 同一层上并发的解析共享这个槽，只有一个会真正创建实例
            let slot = self.scope.slot(key);
            slot.get_or_try_init(|| async move {
                let created = self.instantiate(creatable, location, origin, path).await?;
                debug!("Caching singleton {} as {}", location, key);
                Ok::<_, InjectError>(created)
            })
            .await
            .cloned()
        } else {
            self.instantiate(creatable, location, origin, path).await
        };

        match (outcome, creatable.on_error.as_ref()) {
            (Ok(created), _) => Ok(created),
            (Err(err), Some(handler)) => {
                warn!("Recovering from failure in {}: {}", location, err);
                InnerStats::bump(&self.shared.stats.recovered_errors);
                handler(err)
            }
            (Err(err), None) => Err(err),
        }
    }

    async fn instantiate(
        &self,
        creatable: &Creatable,
        location: &str,
        origin: &str,
        path: &ResolutionPath,
    ) -> Result<Instance, InjectError> {
        let dependencies = self
            .resolve_dependencies(location, &creatable.dependencies, origin, path)
            .await?;

        debug!("Creating new instance for {} by {}", location, creatable.kind);
        InnerStats::bump(&self.shared.stats.instantiations);

        match (creatable.kind, &creatable.producer) {
            (CreationKind::Factory, Export::Factory(factory)) => {
                let produced =
                    factory(dependencies).map_err(|e| InjectError::instantiation(location, e))?;
                produced
                    .settle()
                    .await
                    .map_err(|e| InjectError::instantiation(location, e))
            }
            (CreationKind::Constructor, Export::Constructor(constructor)) => {
                constructor(dependencies).map_err(|e| InjectError::instantiation(location, e))
            }
            (kind, producer) => Err(InjectError::instantiation(
                location,
                format!("a {} cannot be used as a {}", producer.describe(), kind),
            )),
        }
    }

    async fn resolve_dependencies(
        &self,
        dependent: &str,
        names: &[String],
        origin: &str,
        path: &ResolutionPath,
    ) -> Result<Dependencies, InjectError> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let value = self
                .resolve_name(name, origin, path)
                .await
                .map_err(|source| InjectError::Dependency {
                    dependent: dependent.to_string(),
                    dependency: name.clone(),
                    source: Box::new(source),
                })?;
            resolved.push(value);
        }
        Ok(Dependencies::new(resolved))
    }

    fn cached(&self, key: &str) -> Option<Instance> {
        let hit = self.scope.lookup(key);
        if hit.is_some() {
            debug!("Instance exists, using cache: {}", key);
            InnerStats::bump(&self.shared.stats.cache_hits);
        }
        hit
    }
}
