//! Mock 服务启动入口
//!
//! 在四个端口上分别启动目录、订单、会员账本与购物车的内存实现，
//! 供结算服务本地联调。`--seed` 会预置演示商品与购物车数据。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use clap::Parser;
use rand::Rng;
use tower_http::trace::TraceLayer;
use tracing::info;

use mock_services::models::{MockCartLine, MockProduct, Variant};
use mock_services::services::{
    CartServiceState, CatalogServiceState, MembershipServiceState, OrderServiceState,
    cart_routes, catalog_routes, membership_routes, order_routes,
};

#[derive(Debug, Parser)]
#[command(name = "mock-server", about = "结算下游的 mock 服务集合")]
struct Args {
    /// 目录服务端口
    #[arg(long, default_value_t = 9101)]
    catalog_port: u16,

    /// 订单服务端口
    #[arg(long, default_value_t = 9102)]
    order_port: u16,

    /// 会员账本端口
    #[arg(long, default_value_t = 9103)]
    membership_port: u16,

    /// 购物车端口
    #[arg(long, default_value_t = 9104)]
    cart_port: u16,

    /// 预置演示数据
    #[arg(long, default_value_t = false)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let catalog = Arc::new(CatalogServiceState::default());
    let orders = Arc::new(OrderServiceState::default());
    let ledger = Arc::new(MembershipServiceState::default());
    let cart = Arc::new(CartServiceState::default());

    if args.seed {
        seed_demo_data(&catalog, &cart);
        info!("演示数据已预置");
    }

    let handles = vec![
        tokio::spawn(serve(
            catalog_routes().with_state(catalog),
            args.catalog_port,
            "catalog",
        )),
        tokio::spawn(serve(
            order_routes().with_state(orders),
            args.order_port,
            "order",
        )),
        tokio::spawn(serve(
            membership_routes().with_state(ledger),
            args.membership_port,
            "membership",
        )),
        tokio::spawn(serve(
            cart_routes().with_state(cart),
            args.cart_port,
            "cart",
        )),
    ];

    for handle in handles {
        handle.await??;
    }
    Ok(())
}

async fn serve(router: Router, port: u16, name: &'static str) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("mock {} 服务监听 {}", name, addr);

    axum::serve(listener, router.layer(TraceLayer::new_for_http())).await?;
    Ok(())
}

/// 预置演示商品与购物车
fn seed_demo_data(catalog: &CatalogServiceState, cart: &CartServiceState) {
    let mut rng = rand::rng();
    let variants = ["black/M", "black/L", "red/M", "red/L"];

    for (product_id, name, unit_price) in [
        ("prod-tee", "基础款 T 恤", 50.0),
        ("prod-hoodie", "连帽卫衣", 120.0),
        ("prod-cap", "棒球帽", 35.0),
    ] {
        let stock: HashMap<String, u32> = variants
            .iter()
            .map(|v| (v.to_string(), rng.random_range(5..50)))
            .collect();
        catalog.products.insert(
            product_id,
            MockProduct {
                product_id: product_id.to_string(),
                name: name.to_string(),
                unit_price,
                stock,
            },
        );
    }

    for (line_id, product_id, unit_price, quantity) in
        [("line-demo-1", "prod-tee", 50.0, 2), ("line-demo-2", "prod-cap", 35.0, 1)]
    {
        cart.lines.insert(
            line_id,
            MockCartLine {
                id: line_id.to_string(),
                user_id: "user-demo".to_string(),
                product_id: product_id.to_string(),
                variant: Variant {
                    color: "black".to_string(),
                    size: "M".to_string(),
                },
                unit_price,
                quantity,
            },
        );
    }
}
