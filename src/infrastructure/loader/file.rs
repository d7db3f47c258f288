//! 文件系统数据模块加载器
//!
//! 把 JSON 与 TOML 文件加载为普通的 `serde_json::Value` 导出。解析按常见的
//! 模块约定依次尝试 `<p>`、`<p>.json`、`<p>.toml`、`<p>/index.json`、
//! `<p>/index.toml`；裸库标识在配置的库目录中查找。解析过的文件会被缓存，
//! 每个位置只从磁盘读取一次。

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use super::ModuleLoader;
use crate::errors::LoaderError;
use crate::infrastructure::module::{Export, RawModule};
use crate::infrastructure::paths;

const EXTENSIONS: [&str; 2] = ["json", "toml"];

#[derive(Default)]
pub struct FileLoader {
    library_dirs: Vec<PathBuf>,
    cache: DashMap<String, RawModule>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加裸库标识的查找目录
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    /// 已缓存的解析结果数量
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn candidates(base: &str) -> Vec<String> {
        let trimmed = base.trim_end_matches('/');
        let mut candidates = vec![trimmed.to_string()];
        candidates.extend(EXTENSIONS.iter().map(|ext| format!("{}.{}", trimmed, ext)));
        candidates.extend(EXTENSIONS.iter().map(|ext| format!("{}/index.{}", trimmed, ext)));
        candidates
    }

    fn parse(location: &str, content: &str) -> Result<serde_json::Value, LoaderError> {
        let parse_error = |reason: String| LoaderError::Parse {
            location: location.to_string(),
            reason,
        };

        match Path::new(location).extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            Some("toml") => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            _ => Err(parse_error("unsupported file type".to_string())),
        }
    }
}

#[async_trait]
impl ModuleLoader for FileLoader {
    // `resolve_canonical` 是同步接口，这里的 `is_file` 探测会短暂阻塞当前工作线程；
    // 每个候选目录最多探测五个文件
    fn resolve_canonical(&self, name: &str, origin: &str) -> Result<String, LoaderError> {
        let bases: Vec<String> = if paths::is_relative(name) {
            vec![paths::join(origin, name)]
        } else if paths::is_rooted(name) {
            vec![paths::normalize(name)]
        } else {
            self.library_dirs
                .iter()
                .map(|dir| paths::join(&dir.to_string_lossy(), name))
                .collect()
        };

        bases
            .iter()
            .flat_map(|base| Self::candidates(base))
            .find(|candidate| Path::new(candidate).is_file())
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
                origin: origin.to_string(),
            })
    }

    async fn load(&self, location: &str) -> Result<RawModule, LoaderError> {
        if let Some(module) = self.cache.get(location) {
            return Ok(module.value().clone());
        }

        tracing::debug!("Reading data module {}", location);
        let content = tokio::fs::read_to_string(location)
            .await
            .map_err(|source| LoaderError::Io {
                location: location.to_string(),
                source,
            })?;
        let value = Self::parse(location, &content)?;
        let module = RawModule::plain(Export::value(value));

        Ok(self
            .cache
            .entry(location.to_string())
            .or_insert(module)
            .value()
            .clone())
    }
}
