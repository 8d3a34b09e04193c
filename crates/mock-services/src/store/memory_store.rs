//! 内存存储
//!
//! 基于 DashMap 的并发内存存储。库存扣减依赖 `mutate` 在分片锁内
//! 完成读-改-写，保证同一 key 上的比较扣减是原子的。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// 通用内存存储
///
/// 值按克隆读出，不对外暴露锁。
#[derive(Debug)]
pub struct MemoryStore<T> {
    data: Arc<DashMap<String, T>>,
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 插入或覆盖
    pub fn insert(&self, id: &str, value: T) {
        self.data.insert(id.to_string(), value);
    }

    /// 读取克隆
    pub fn get(&self, id: &str) -> Option<T> {
        self.data.get(id).map(|v| v.clone())
    }

    /// 删除并返回旧值
    pub fn remove(&self, id: &str) -> Option<T> {
        self.data.remove(id).map(|(_, v)| v)
    }

    /// 在分片锁内对指定 key 的值做读-改-写
    ///
    /// key 不存在时返回 None，闭包不会执行。这是库存
    /// 比较扣减唯一安全的入口，get + insert 两步会丢并发更新。
    pub fn mutate<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.data.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// key 不存在时插入闭包计算的值，存在时返回已有值
    ///
    /// 检查与插入在同一次 entry 操作内完成，返回 (值, 是否为首次插入)。
    /// 幂等入账的检查-应用必须走这里，get + insert 两步会让并发的
    /// 同 key 请求都通过检查。
    pub fn get_or_insert_with(&self, id: &str, f: impl FnOnce() -> T) -> (T, bool) {
        match self.data.entry(id.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(f()).clone(), true),
        }
    }

    /// 在 entry 锁内插入或更新
    ///
    /// 闭包拿到当前值（不存在为 None）并返回新值，返回写入后的值。
    pub fn upsert_with(&self, id: &str, f: impl FnOnce(Option<&T>) -> T) -> T {
        match self.data.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let updated = f(Some(entry.get()));
                *entry.get_mut() = updated.clone();
                updated
            }
            Entry::Vacant(entry) => {
                let created = f(None);
                entry.insert(created.clone());
                created
            }
        }
    }

    /// 按条件筛选
    pub fn list_by<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }
}

impl<T: Clone> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}
