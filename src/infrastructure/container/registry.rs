//! 代码中直接登记的生产者
//!
//! 注册表在位置解析之前被查询，命中时完全绕过路径解析与加载器。

use dashmap::DashMap;

use crate::infrastructure::module::{CreationMetadata, Export, RawModule};

#[derive(Default)]
pub(crate) struct Registry {
    registrations: DashMap<String, RawModule>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        &self,
        name: impl Into<String>,
        producer: Export,
        metadata: CreationMetadata,
    ) {
        self.registrations
            .insert(name.into(), RawModule::new(producer, metadata));
    }

    pub(crate) fn deregister(&self, name: &str) -> bool {
        self.registrations.remove(name).is_some()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<RawModule> {
        self.registrations.get(name).map(|entry| entry.value().clone())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}
