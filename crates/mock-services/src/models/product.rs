use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 商品
///
/// 库存按变体 key（"color/size"）维护，扣减发生在店内存储的
/// 分片锁内，保证比较扣减的原子性。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockProduct {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    /// 变体 key -> 可用库存
    pub stock: HashMap<String, u32>,
}
