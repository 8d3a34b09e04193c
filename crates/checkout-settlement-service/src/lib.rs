//! 结算服务
//!
//! 将一组选中的购物车行变成一个已确认的订单：解析奖励定价、扣减库存、
//! 创建订单、会员账本入账、清理购物车。五个步骤分属互相独立可失败的
//! 下游调用，没有统一事务边界，部分完成（库存已扣但订单未建）必须被
//! 补偿收敛并可诊断——这是整个系统唯一有真实失败复杂度的地方。

pub mod api;
pub mod clients;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod reconciler;
