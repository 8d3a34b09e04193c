//! 会员账户与账本入账模型
//!
//! 这些结构在结算服务（账本客户端）与 mock 账本服务之间共享，
//! 保证两侧的线格式不会漂移。账户只能由会员账本在入账时变更。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::Tier;

/// 会员账户
///
/// `tier` 是从 `total_spent` 派生的展示字段，账本在每次入账后重算，
/// 永远不作为独立的事实来源。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipAccount {
    pub user_id: String,
    pub tier: Tier,
    pub total_spent: f64,
    pub total_points: i64,
}

/// 一次消费入账
///
/// `idempotency_key` 由订单号派生（settle-{order_id}），账本必须保证
/// 同一 key 重放时返回首次入账的结果且不重复累计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPosting {
    pub amount: f64,
    pub points: i64,
    /// 本次结算消耗的奖励兑换记录 ID（未使用奖励时为空）
    pub redemption_id: Option<String>,
    /// 奖励类型标签，与 redemption_id 同生同灭
    pub reward_kind: Option<String>,
    pub idempotency_key: String,
}

/// 奖励兑换记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRedemption {
    pub redemption_id: String,
    pub user_id: String,
    pub order_id: String,
    /// 奖励类型标签（DISCOUNT / FREE_SHIPPING / CASHBACK / CHARITY）
    pub reward_kind: String,
    pub redeemed_at: DateTime<Utc>,
}
