//! 模块加载能力
//!
//! 容器不解析也不执行代码：把规范位置变成原始导出值的工作交给外部加载器，
//! 容器只在其上叠加解析与实例化语义。

pub mod file;
pub mod memory;

pub use file::FileLoader;
pub use memory::MemoryLoader;

use async_trait::async_trait;

use super::module::RawModule;
use super::paths;
use crate::errors::LoaderError;

/// 加载器接口
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// 按加载器自身规则把名称解析为规范位置；相对名称以 `origin` 为起点
    fn resolve_canonical(&self, name: &str, origin: &str) -> Result<String, LoaderError>;

    /// 加载规范位置上的原始模块；加载器负责缓存已加载的模块
    async fn load(&self, location: &str) -> Result<RawModule, LoaderError>;

    /// 位于 `location` 的模块声明的相对依赖以此为起点解析
    fn origin_of(&self, location: &str) -> String {
        paths::dirname(location)
    }
}
