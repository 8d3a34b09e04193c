//! 奖励类型定义
//!
//! 奖励是封闭的带标签联合：新增奖励类型时 match 的穷尽性检查会强制
//! 所有分支同步更新，避免字符串分发遗漏分支的问题。
//! 每次结算最多选用一个奖励，选择新奖励会替换旧选择（上游保证，不叠加）。

use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// 奖励类型
///
/// 四种奖励的货币语义各不相同：
/// - `Discount`: 从小计中扣减，受上限约束
/// - `FreeShipping`: 运费清零，小计不变
/// - `Cashback`: 购后返现，仅作信息记录，不参与实付金额
/// - `Charity`: 与返现同构，但金额标记为捐赠而非用户积分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum RewardOffer {
    Discount { percent: f64, max_cap: f64 },
    FreeShipping,
    Cashback { percent: f64 },
    Charity { percent: f64, beneficiary: String },
}

impl RewardOffer {
    /// 构造折扣奖励
    ///
    /// 百分比必须落在 [0, 100]，上限必须非负。越界即拒绝，
    /// 不做 clamp——静默修正会掩盖运营配置错误。
    pub fn discount(percent: f64, max_cap: f64) -> Result<Self, RewardError> {
        Self::check_percent(percent)?;
        if max_cap < 0.0 {
            return Err(RewardError::NegativeCap { max_cap });
        }
        Ok(Self::Discount { percent, max_cap })
    }

    /// 构造免运费奖励
    pub fn free_shipping() -> Self {
        Self::FreeShipping
    }

    /// 构造返现奖励
    pub fn cashback(percent: f64) -> Result<Self, RewardError> {
        Self::check_percent(percent)?;
        Ok(Self::Cashback { percent })
    }

    /// 构造公益捐赠奖励
    pub fn charity(percent: f64, beneficiary: impl Into<String>) -> Result<Self, RewardError> {
        Self::check_percent(percent)?;
        let beneficiary = beneficiary.into();
        if beneficiary.trim().is_empty() {
            return Err(RewardError::MissingBeneficiary);
        }
        Ok(Self::Charity {
            percent,
            beneficiary,
        })
    }

    /// 校验已反序列化的奖励
    ///
    /// serde 反序列化会绕过构造函数，API 入口必须在使用前显式校验。
    pub fn validate(&self) -> Result<(), RewardError> {
        match self {
            Self::Discount { percent, max_cap } => {
                Self::check_percent(*percent)?;
                if *max_cap < 0.0 {
                    return Err(RewardError::NegativeCap { max_cap: *max_cap });
                }
                Ok(())
            }
            Self::FreeShipping => Ok(()),
            Self::Cashback { percent } => Self::check_percent(*percent),
            Self::Charity {
                percent,
                beneficiary,
            } => {
                Self::check_percent(*percent)?;
                if beneficiary.trim().is_empty() {
                    return Err(RewardError::MissingBeneficiary);
                }
                Ok(())
            }
        }
    }

    /// 奖励类型标签，用于日志与兑换记录
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discount { .. } => "DISCOUNT",
            Self::FreeShipping => "FREE_SHIPPING",
            Self::Cashback { .. } => "CASHBACK",
            Self::Charity { .. } => "CHARITY",
        }
    }

    fn check_percent(percent: f64) -> Result<(), RewardError> {
        if !(0.0..=100.0).contains(&percent) || percent.is_nan() {
            return Err(RewardError::PercentOutOfRange { percent });
        }
        Ok(())
    }
}
