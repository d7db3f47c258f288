//! 基础设施层
//!
//! - 分层依赖注入上下文
//! - 名称解析（别名、bundle、根相对路径）
//! - 模块加载器

pub mod container;
pub mod loader;
pub mod module;
pub mod path_resolver;
pub mod paths;

// 重新导出API
pub use container::{Injector, InjectorStats, SELF_REFERENCE};
pub use loader::{FileLoader, MemoryLoader, ModuleLoader};
pub use module::{
    instance, CreationKind, CreationMetadata, Dependencies, Export, Instance, Produced, RawModule,
    Resolved,
};
pub use path_resolver::{Location, PathResolver};
