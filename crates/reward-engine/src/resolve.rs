//! 定价解析
//!
//! 将「小计 + 可选奖励 + 基础运费」解析为一次结算的货币效果。
//! 纯函数，所有副作用（扣库存、记账）由下游结算编排器负责。

use serde::Serialize;
use tracing::debug;

use crate::error::RewardError;
use crate::offer::RewardOffer;

/// 捐赠备注
///
/// 金额不计入用户实付也不进入用户积分，仅作为捐赠凭据随订单记录。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharityNote {
    pub amount: f64,
    pub beneficiary: String,
}

/// 一次结算尝试的定价结果
///
/// 派生数据，仅随其产生的订单存在，不独立持久化。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    pub subtotal: f64,
    pub discount: f64,
    pub shipping_cost: f64,
    /// 实际向用户收取的金额: max(subtotal - discount, 0) + shipping_cost
    pub final_total: f64,
    /// 每整货币单位实付金额奖励 1 积分
    pub points_awarded: i64,
    /// 返现金额（信息性，不从 final_total 中扣减，由会员账本购后处理）
    pub cashback_note: Option<f64>,
    /// 捐赠备注（信息性，与返现同构但受益方为公益机构）
    pub charity_note: Option<CharityNote>,
}

/// 解析奖励对小计的货币效果
///
/// 前置条件：小计与基础运费非负（违反即拒绝，不做 clamp）；
/// 奖励本身已在构造时校验合法。
pub fn resolve(
    subtotal: f64,
    reward: Option<&RewardOffer>,
    base_shipping: f64,
) -> Result<PricingQuote, RewardError> {
    if subtotal < 0.0 || subtotal.is_nan() {
        return Err(RewardError::NegativeSubtotal { subtotal });
    }
    if base_shipping < 0.0 || base_shipping.is_nan() {
        return Err(RewardError::NegativeShipping {
            shipping: base_shipping,
        });
    }

    let mut discount = 0.0;
    let mut shipping_cost = base_shipping;
    let mut cashback_note = None;
    let mut charity_note = None;

    match reward {
        None => {}
        Some(RewardOffer::Discount { percent, max_cap }) => {
            discount = (subtotal * percent / 100.0).min(*max_cap);
        }
        Some(RewardOffer::FreeShipping) => {
            shipping_cost = 0.0;
        }
        Some(RewardOffer::Cashback { percent }) => {
            cashback_note = Some(subtotal * percent / 100.0);
        }
        Some(RewardOffer::Charity {
            percent,
            beneficiary,
        }) => {
            charity_note = Some(CharityNote {
                amount: subtotal * percent / 100.0,
                beneficiary: beneficiary.clone(),
            });
        }
    }

    let final_total = (subtotal - discount).max(0.0) + shipping_cost;
    let points_awarded = final_total.floor() as i64;

    debug!(
        subtotal,
        discount,
        shipping_cost,
        final_total,
        points_awarded,
        reward = reward.map(RewardOffer::kind),
        "定价解析完成"
    );

    Ok(PricingQuote {
        subtotal,
        discount,
        shipping_cost,
        final_total,
        points_awarded,
        cashback_note,
        charity_note,
    })
}
