use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MockCartLine;

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Confirmed,
}

/// 订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockOrder {
    pub order_id: String,
    pub user_id: String,
    pub lines: Vec<MockCartLine>,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}
