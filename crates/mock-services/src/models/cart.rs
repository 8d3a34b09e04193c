use serde::{Deserialize, Serialize};

/// 商品变体（颜色 + 尺码）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub color: String,
    pub size: String,
}

impl Variant {
    /// 库存表的 key 格式
    pub fn stock_key(&self) -> String {
        format!("{}/{}", self.color, self.size)
    }
}

/// 购物车行
///
/// `user_id` 仅在 mock 侧用于归属筛选，序列化时一并输出，
/// 结算服务的反序列化会忽略多余字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockCartLine {
    pub id: String,
    /// 结算服务提交的行不带 user_id，反序列化时置空
    #[serde(default)]
    pub user_id: String,
    pub product_id: String,
    pub variant: Variant,
    pub unit_price: f64,
    pub quantity: u32,
}
