//! 内存模块表
//!
//! 相当于宿主的模块缓存：模块以规范位置（`/app/lib/util`）或裸库标识
//! （`nice_util`）登记，解析时先尝试精确位置，再尝试 `<位置>/index`。

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

use super::ModuleLoader;
use crate::errors::LoaderError;
use crate::infrastructure::module::RawModule;
use crate::infrastructure::paths;

#[derive(Default)]
pub struct MemoryLoader {
    modules: DashMap<String, RawModule>,
    latencies: DashMap<String, Duration>,
    loads: DashMap<String, usize>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记模块；根路径位置会被规范化
    pub fn define(&self, location: impl AsRef<str>, module: RawModule) -> &Self {
        let location = location.as_ref();
        let key = if paths::is_rooted(location) {
            paths::normalize(location)
        } else {
            location.to_string()
        };
        self.modules.insert(key, module);
        self
    }

    /// 为某个位置的加载注入延迟
    pub fn with_latency(self, location: impl Into<String>, latency: Duration) -> Self {
        self.latencies.insert(location.into(), latency);
        self
    }

    pub fn contains(&self, location: &str) -> bool {
        self.modules.contains_key(location)
    }

    /// 某个位置被加载的次数
    pub fn load_count(&self, location: &str) -> usize {
        self.loads.get(location).map(|count| *count).unwrap_or(0)
    }
}

#[async_trait]
impl ModuleLoader for MemoryLoader {
    fn resolve_canonical(&self, name: &str, origin: &str) -> Result<String, LoaderError> {
        let candidate = if paths::is_relative(name) {
            paths::join(origin, name)
        } else if paths::is_rooted(name) {
            paths::normalize(name)
        } else {
            name.to_string()
        };

        let index = format!("{}/index", candidate.trim_end_matches('/'));
        [candidate, index]
            .into_iter()
            .find(|location| self.modules.contains_key(location))
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
                origin: origin.to_string(),
            })
    }

    async fn load(&self, location: &str) -> Result<RawModule, LoaderError> {
        let latency = self.latencies.get(location).map(|latency| *latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let module = self
            .modules
            .get(location)
            .map(|module| module.value().clone())
            .ok_or_else(|| LoaderError::NotFound {
                name: location.to_string(),
                origin: location.to_string(),
            })?;
        *self.loads.entry(location.to_string()).or_insert(0) += 1;
        Ok(module)
    }
}
