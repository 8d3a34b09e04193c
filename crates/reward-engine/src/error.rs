//! 奖励引擎错误类型

use thiserror::Error;

/// 奖励构造与定价解析错误
///
/// 构造类错误（百分比越界、上限为负）在奖励被选中时就拒绝，
/// 解析类错误（小计为负）属于调用方违反前置条件，两类都不做静默修正。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RewardError {
    #[error("折扣百分比越界: {percent}，必须在 [0, 100] 区间内")]
    PercentOutOfRange { percent: f64 },

    #[error("折扣上限为负: {max_cap}")]
    NegativeCap { max_cap: f64 },

    #[error("捐赠受益方不能为空")]
    MissingBeneficiary,

    #[error("小计金额为负: {subtotal}")]
    NegativeSubtotal { subtotal: f64 },

    #[error("基础运费为负: {shipping}")]
    NegativeShipping { shipping: f64 },
}
