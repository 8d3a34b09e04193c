//! 结算服务错误类型
//!
//! 在共享库 StorefrontError 基础上定义结算特有的失败分类。分类决定行为：
//! 前置条件与资源/下游失败会中止结算（后两者伴随库存补偿），
//! 而账本入账失败、购物车清理失败属于降级成功——订单已经存在，
//! 它们只体现在回执标记上，不出现在这个枚举里。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use reward_engine::RewardError;
use storefront_shared::error::StorefrontError;

/// 结算失败分类
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// 前置条件：结算必须至少包含一条购物车行
    #[error("结算选择为空，至少需要一条购物车行")]
    EmptySelection,

    /// 前置条件：奖励构造非法或定价前置条件被违反（如负小计）
    #[error("奖励无效: {0}")]
    InvalidReward(#[from] RewardError),

    /// 资源失败：商品下架/不存在，或目录服务对该行不可达
    #[error("商品不可用: product_id={product_id}")]
    LineUnavailable { product_id: String },

    /// 资源失败：指定变体库存不足
    #[error("库存不足: product_id={product_id}, variant={variant}")]
    InsufficientStock {
        product_id: String,
        variant: String,
    },

    /// 下游失败：订单创建调用失败（库存补偿已在返回前执行）
    #[error("订单服务不可用: {0}")]
    OrderServiceUnavailable(String),

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] StorefrontError),
}

impl SettlementError {
    /// 是否为前置条件失败（在任何远程调用发起之前被拒绝）
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::EmptySelection | Self::InvalidReward(_))
    }

    /// 返回错误码（用于 API 响应与指标标签）
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::InvalidReward(_) => "INVALID_REWARD",
            Self::LineUnavailable { .. } => "LINE_UNAVAILABLE",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::OrderServiceUnavailable(_) => "ORDER_SERVICE_UNAVAILABLE",
            Self::Shared(e) => e.code(),
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptySelection | Self::InvalidReward(_) => StatusCode::BAD_REQUEST,
            Self::LineUnavailable { .. } => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::OrderServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Shared(StorefrontError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Shared(StorefrontError::Validation(_))
            | Self::Shared(StorefrontError::InvalidArgument { .. }) => StatusCode::BAD_REQUEST,
            Self::Shared(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = match &self {
            Self::Shared(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "结算内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}
