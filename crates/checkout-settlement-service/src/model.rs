//! 结算域数据契约
//!
//! CheckoutRequest 是一次结算尝试的全部输入：不读任何全局购物车/会话状态，
//! 编排过程中需要什么都显式随请求传入。一次请求只服务一次尝试，
//! 失败后必须基于最新的购物车/库存读数重新构造，不允许盲目重放过期行。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reward_engine::RewardOffer;

/// 商品变体键（颜色 + 尺码）
///
/// 库存按 (product_id, variant) 粒度扣减。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantKey {
    pub color: String,
    pub size: String,
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.color, self.size)
    }
}

/// 购物车行
///
/// 被捕获进 CheckoutRequest 后即不可变；行 ID 用于结算成功后的购物车清理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub variant: VariantKey,
    pub unit_price: f64,
    pub quantity: u32,
}

impl CartLine {
    /// 行小计
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// 一次结算尝试的完整输入
///
/// 不变式：selected_lines 非空（编排器入口校验）；奖励至多一个，
/// 上游选择新奖励时替换旧选择，不叠加。
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub selected_lines: Vec<CartLine>,
    pub reward: Option<RewardOffer>,
    pub shipping_base_cost: f64,
}

impl CheckoutRequest {
    /// 当前选中行的小计
    pub fn subtotal(&self) -> f64 {
        self.selected_lines.iter().map(CartLine::line_total).sum()
    }
}

/// 结算回执
///
/// `ledger_pending` / `cart_pruned` 标记降级成功：订单已经存在，
/// 残留步骤交由后台对账任务幂等重试，不作为错误返回给用户。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub order_id: String,
    pub final_total: f64,
    pub points_awarded: i64,
    pub ledger_pending: bool,
    pub cart_pruned: bool,
}

/// 商品（目录服务所有的外部实体，此处只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub name: String,
}

/// 订单（订单服务所有的外部实体，结算创建后即移交）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub lines: Vec<CartLine>,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
}
