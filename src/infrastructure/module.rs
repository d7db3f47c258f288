//! 原始模块与创建元数据
//!
//! 加载器产出 [`RawModule`]；引擎在加载完成后立即调用 [`Loadable::classify`]
//! 将其归类为普通值或可创建单元，此后不再探测元数据。

use futures_util::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{BoxError, InjectError};

/// 容器中保存与传递的实例，同一性以 `Arc::ptr_eq` 判定
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 工厂函数：以按声明顺序解析好的依赖为位置参数
pub type FactoryFn = Arc<dyn Fn(Dependencies) -> Result<Produced, BoxError> + Send + Sync>;

/// 构造器：以依赖为构造参数同步创建实例
pub type ConstructorFn = Arc<dyn Fn(Dependencies) -> Result<Instance, BoxError> + Send + Sync>;

/// 错误恢复回调：返回值代替失败成为解析结果，也可以重新抛出
pub type ErrorHandler = Arc<dyn Fn(InjectError) -> Result<Instance, InjectError> + Send + Sync>;

/// 将任意值包装为实例
pub fn instance<T: Any + Send + Sync>(value: T) -> Instance {
    Arc::new(value)
}

/// 工厂调用的产物：立即值或待完成的异步值
pub enum Produced {
    Ready(Instance),
    Pending(BoxFuture<'static, Result<Instance, BoxError>>),
}

impl Produced {
    pub fn ready<T: Any + Send + Sync>(value: T) -> Self {
        Produced::Ready(Arc::new(value))
    }

    pub fn pending<F, T>(future: F) -> Self
    where
        F: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Any + Send + Sync,
    {
        Produced::Pending(Box::pin(async move {
            let value = future.await?;
            Ok(Arc::new(value) as Instance)
        }))
    }

    /// 等待异步产物，立即值原样返回
    pub async fn settle(self) -> Result<Instance, BoxError> {
        match self {
            Produced::Ready(value) => Ok(value),
            Produced::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for Produced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Produced::Ready(_) => f.write_str("Produced::Ready(..)"),
            Produced::Pending(_) => f.write_str("Produced::Pending(..)"),
        }
    }
}

/// 模块导出的原始值
#[derive(Clone)]
pub enum Export {
    Value(Instance),
    Factory(FactoryFn),
    Constructor(ConstructorFn),
}

impl Export {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Export::Value(Arc::new(value))
    }

    /// 同步工厂
    pub fn factory<F, T>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Export::Factory(Arc::new(move |deps| factory(deps).map(Produced::ready)))
    }

    /// 返回异步结果的工厂，引擎会在缓存或返回之前等待它
    pub fn async_factory<F, Fut, T>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Any + Send + Sync,
    {
        Export::Factory(Arc::new(move |deps| Ok(Produced::pending(factory(deps)))))
    }

    pub fn constructor<F, T>(constructor: F) -> Self
    where
        F: Fn(Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Export::Constructor(Arc::new(move |deps| {
            constructor(deps).map(|value| Arc::new(value) as Instance)
        }))
    }

    /// 不经实例化时的原样导出；函数本身也是一个值
    pub fn into_instance(self) -> Instance {
        match self {
            Export::Value(value) => value,
            Export::Factory(factory) => Arc::new(factory),
            Export::Constructor(constructor) => Arc::new(constructor),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Export::Value(_) => "plain value",
            Export::Factory(_) => "factory function",
            Export::Constructor(_) => "constructor",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Export({})", self.describe())
    }
}

/// 创建方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    /// 以依赖为参数调用，返回值即实例
    Factory,
    /// 以依赖为构造参数实例化
    Constructor,
}

impl FromStr for CreationKind {
    type Err = String;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "factory" => Ok(CreationKind::Factory),
            "constructor" => Ok(CreationKind::Constructor),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for CreationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationKind::Factory => f.write_str("factory"),
            CreationKind::Constructor => f.write_str("constructor"),
        }
    }
}

/// 附加在导出值上的创建元数据
#[derive(Clone, Default)]
pub struct CreationMetadata {
    /// `factory` | `constructor`；缺省时导出值原样返回
    pub kind: Option<String>,
    pub dependencies: Vec<String>,
    pub singleton: bool,
    /// 单例缓存键，缺省为规范位置
    pub id: Option<String>,
    pub on_error: Option<ErrorHandler>,
}

impl CreationMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Self {
        Self::with_kind("factory")
    }

    pub fn constructor() -> Self {
        Self::with_kind("constructor")
    }

    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn inject<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(InjectError) -> Result<Instance, InjectError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for CreationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationMetadata")
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("singleton", &self.singleton)
            .field("id", &self.id)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// 加载器产出的原始模块
#[derive(Clone, Debug)]
pub struct RawModule {
    pub export: Export,
    pub metadata: Option<CreationMetadata>,
}

impl RawModule {
    pub fn new(export: Export, metadata: CreationMetadata) -> Self {
        Self {
            export,
            metadata: Some(metadata),
        }
    }

    /// 不带元数据的普通模块
    pub fn plain(export: Export) -> Self {
        Self {
            export,
            metadata: None,
        }
    }
}

/// 可创建单元
#[derive(Clone)]
pub struct Creatable {
    pub kind: CreationKind,
    pub producer: Export,
    pub dependencies: Vec<String>,
    pub singleton: bool,
    pub id: Option<String>,
    pub on_error: Option<ErrorHandler>,
}

/// 加载后归类的结果
pub enum Loadable {
    /// 原样返回的值；声明的依赖仍会被解析
    Plain {
        value: Instance,
        dependencies: Vec<String>,
    },
    Creatable(Creatable),
}

impl Loadable {
    /// 加载后钩子：检查一次元数据，决定模块是普通值还是可创建单元
    pub fn classify(raw: RawModule, location: &str) -> Result<Self, InjectError> {
        let Some(metadata) = raw.metadata else {
            return Ok(Loadable::Plain {
                value: raw.export.into_instance(),
                dependencies: Vec::new(),
            });
        };

        let Some(kind) = metadata.kind else {
            return Ok(Loadable::Plain {
                value: raw.export.into_instance(),
                dependencies: metadata.dependencies,
            });
        };

        let kind = kind
            .parse::<CreationKind>()
            .map_err(|kind| InjectError::UnknownCreationKind {
                kind,
                location: location.to_string(),
            })?;

        Ok(Loadable::Creatable(Creatable {
            kind,
            producer: raw.export,
            dependencies: metadata.dependencies,
            singleton: metadata.singleton,
            id: metadata.id,
            on_error: metadata.on_error,
        }))
    }
}

/// 解析结果：单个实例，或 bundle 展开后的有序序列
#[derive(Clone)]
pub enum Resolved {
    Instance(Instance),
    Bundle(Vec<Resolved>),
}

impl Resolved {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Resolved::Instance(value) => Some(value),
            Resolved::Bundle(_) => None,
        }
    }

    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Resolved::Instance(value) => Some(value),
            Resolved::Bundle(_) => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&[Resolved]> {
        match self {
            Resolved::Instance(_) => None,
            Resolved::Bundle(members) => Some(members),
        }
    }

    pub fn into_bundle(self) -> Option<Vec<Resolved>> {
        match self {
            Resolved::Instance(_) => None,
            Resolved::Bundle(members) => Some(members),
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Resolved::Bundle(_))
    }

    /// 向下转型；bundle 或类型不符时返回 `TypeMismatch`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>, InjectError> {
        self.as_instance()
            .and_then(|value| value.clone().downcast::<T>().ok())
            .ok_or_else(|| InjectError::type_mismatch("resolution", std::any::type_name::<T>()))
    }

    /// 同一实例（引用相等）；bundle 逐项比较
    pub fn ptr_eq(&self, other: &Resolved) -> bool {
        match (self, other) {
            (Resolved::Instance(a), Resolved::Instance(b)) => Arc::ptr_eq(a, b),
            (Resolved::Bundle(a), Resolved::Bundle(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Instance(_) => f.write_str("Instance(..)"),
            Resolved::Bundle(members) => f.debug_list().entries(members).finish(),
        }
    }
}

/// 传给工厂或构造器的位置参数
#[derive(Clone, Debug, Default)]
pub struct Dependencies {
    items: Vec<Resolved>,
}

impl Dependencies {
    pub fn new(items: Vec<Resolved>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resolved> {
        self.items.get(index)
    }

    /// 第 `index` 个依赖，向下转型为 `T`
    pub fn instance<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, InjectError> {
        self.items
            .get(index)
            .and_then(Resolved::as_instance)
            .and_then(|value| value.clone().downcast::<T>().ok())
            .ok_or_else(|| {
                InjectError::type_mismatch(
                    format!("dependency #{}", index),
                    std::any::type_name::<T>(),
                )
            })
    }

    /// 第 `index` 个依赖（bundle 展开的结果）
    pub fn bundle(&self, index: usize) -> Result<&[Resolved], InjectError> {
        self.items
            .get(index)
            .and_then(Resolved::as_bundle)
            .ok_or_else(|| InjectError::type_mismatch(format!("dependency #{}", index), "a bundle"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolved> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Resolved> {
        self.items
    }
}
