//! 分层实例缓存
//!
//! 每个上下文只拥有自己这一层的条目，并持有父层的显式引用。
//! 读取沿父链向上查找；写入与删除只作用于本层。

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::infrastructure::module::Instance;

/// 本层的一个缓存槽；未初始化的槽表示单例正在创建中
pub(crate) type Slot = Arc<OnceCell<Instance>>;

pub(crate) struct Scope {
    entries: DashMap<String, Slot>,
    parent: Option<Arc<Scope>>,
    depth: usize,
}

impl Scope {
    pub(crate) fn root() -> Self {
        Self {
            entries: DashMap::new(),
            parent: None,
            depth: 0,
        }
    }

    pub(crate) fn child(parent: &Arc<Scope>) -> Self {
        Self {
            entries: DashMap::new(),
            parent: Some(parent.clone()),
            depth: parent.depth + 1,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// 沿父链查找已就绪的实例
    pub(crate) fn lookup(&self, key: &str) -> Option<Instance> {
        let mut layer = Some(self);
        while let Some(scope) = layer {
            if let Some(found) = scope.local(key) {
                return Some(found);
            }
            layer = scope.parent.as_deref();
        }
        None
    }

    fn local(&self, key: &str) -> Option<Instance> {
        self.entries.get(key).and_then(|slot| slot.get().cloned())
    }

    /// 无条件覆盖本层条目
    pub(crate) fn insert(&self, key: impl Into<String>, value: Instance) {
        self.entries
            .insert(key.into(), Arc::new(OnceCell::new_with(Some(value))));
    }

    /// 只删除本层拥有的条目；祖先层的条目不可见于此操作
    pub(crate) fn remove(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .map(|(_, slot)| slot.initialized())
            .unwrap_or(false)
    }

    /// 取得（或创建）本层的缓存槽，供单例创建时排他初始化
    pub(crate) fn slot(&self, key: &str) -> Slot {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// 本层已就绪条目的键
    pub(crate) fn local_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }
}
