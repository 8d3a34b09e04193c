//! Mock 下游服务集合
//!
//! 以内存实现模拟结算服务依赖的四个下游：商品目录（库存）、订单、
//! 会员账本与购物车。用于本地开发与端到端演示，线格式与真实服务一致。

pub mod models;
pub mod services;
pub mod store;
