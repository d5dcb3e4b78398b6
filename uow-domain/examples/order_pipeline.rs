//! 订单下单流程演示：预提交校验 → 事务提交 → 提交后通知与事件日志
//!
//! 运行：`RUST_LOG=uow_domain=debug cargo run -p uow-domain --example order_pipeline`
//!
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uow_domain::aggregate::Aggregate;
use uow_domain::domain_event::PhaseMarkers;
use uow_domain::entity::Entity;
use uow_domain::event_log::{EventLogStore, InMemoryEventLogStore};
use uow_domain::eventing::{DispatchContext, EventDispatcher, EventHandler, HandlerRegistry};
use uow_domain::persist::{InMemorySession, InMemoryStore};
use uow_domain::unit_of_work::{RetryPolicy, UnitOfWork, retry_on_conflict};
use uow_macros::{Describe, aggregate, domain_event};

#[aggregate(name = "order")]
struct Order {
    customer_id: String,
    lines: Vec<OrderLine>,
    total_cents: u64,
}

#[aggregate(name = "inventory")]
struct Inventory {
    reserved: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Describe)]
struct OrderLine {
    sku: String,
    quantity: u32,
}

#[domain_event(description = "order placed by customer")]
struct OrderPlaced {
    lines: Vec<OrderLine>,
    total_cents: u64,
    tags: Vec<String>,
}

#[domain_event(pre_commit)]
struct OrderSubmitted {
    quantity: u32,
}

#[domain_event(pre_commit)]
struct StockReserved {
    quantity: u32,
}

/// 预提交：预留库存（修改另一个聚合并产生新的预提交事件）
struct ReserveStock {
    session: Arc<InMemorySession>,
}

#[async_trait]
impl EventHandler<OrderSubmitted> for ReserveStock {
    fn handler_name(&self) -> &str {
        "reserve-stock"
    }

    fn phase_markers(&self) -> PhaseMarkers {
        PhaseMarkers::PRE_COMMIT
    }

    async fn handle(&self, event: &OrderSubmitted, _context: &DispatchContext) -> Result<()> {
        self.session.update("main", |inv: &mut Inventory| {
            inv.reserved += event.quantity;
            inv.record_event(StockReserved {
                quantity: event.quantity,
            });
        })?;
        Ok(())
    }
}

/// 预提交：校验预留结果
struct CheckReservation;

#[async_trait]
impl EventHandler<StockReserved> for CheckReservation {
    fn handler_name(&self) -> &str {
        "check-reservation"
    }

    fn phase_markers(&self) -> PhaseMarkers {
        PhaseMarkers::PRE_COMMIT
    }

    async fn handle(&self, event: &StockReserved, context: &DispatchContext) -> Result<()> {
        anyhow::ensure!(event.quantity <= 100, "cannot reserve {} units", event.quantity);
        tracing::info!(inventory = context.aggregate_key(), quantity = event.quantity, "stock reserved");
        Ok(())
    }
}

/// 提交后：通知客户
struct NotifyCustomer;

#[async_trait]
impl EventHandler<OrderPlaced> for NotifyCustomer {
    fn handler_name(&self) -> &str {
        "notify-customer"
    }

    async fn handle(&self, event: &OrderPlaced, context: &DispatchContext) -> Result<()> {
        tracing::info!(
            order = context.aggregate_key(),
            total_cents = event.total_cents,
            "customer notified"
        );
        Ok(())
    }
}

fn place_order(id: &str, lines: Vec<OrderLine>) -> Order {
    let mut order = Order::new(id.to_string());
    order.customer_id = "c-1".to_string();
    order.total_cents = lines.iter().map(|l| u64::from(l.quantity) * 1_250).sum();
    order.lines = lines.clone();

    let quantity = lines.iter().map(|l| l.quantity).sum();
    order.record_event(OrderPlaced {
        lines,
        total_cents: order.total_cents,
        tags: vec!["web".to_string(), "first-order".to_string()],
    });
    order.record_event(OrderSubmitted { quantity });
    order
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("uow_domain=info".parse()?))
        .init();

    let store = InMemoryStore::new();
    let log = Arc::new(InMemoryEventLogStore::new());

    // 初始化库存
    {
        let session = Arc::new(store.session());
        session.add(Inventory::new("main".to_string()))?;
        UnitOfWork::builder()
            .persistence(session)
            .dispatcher(EventDispatcher::new(HandlerRegistry::new()))
            .build()
            .commit()
            .await?;
    }

    let report = retry_on_conflict(&RetryPolicy::default(), |attempt| {
        let store = store.clone();
        let log = log.clone();
        async move {
            tracing::info!(attempt, "placing order");
            let session = Arc::new(store.session());
            session.load::<Inventory>("main")?;
            session.add(place_order(
                "o-1001",
                vec![
                    OrderLine {
                        sku: "TEA-01".to_string(),
                        quantity: 2,
                    },
                    OrderLine {
                        sku: "CUP-04".to_string(),
                        quantity: 1,
                    },
                ],
            ))?;

            let mut registry = HandlerRegistry::new();
            registry
                .register(Arc::new(ReserveStock {
                    session: session.clone(),
                }))
                .register(Arc::new(CheckReservation))
                .register(Arc::new(NotifyCustomer));

            UnitOfWork::builder()
                .persistence(session)
                .dispatcher(EventDispatcher::new(registry))
                .event_log(log)
                .build()
                .commit()
                .await
        }
    })
    .await?;

    println!("commit report: {report:?}");

    let reserved = store
        .get::<Inventory>("main")?
        .map(|inv| inv.reserved)
        .unwrap_or_default();
    println!("inventory reserved: {reserved}");

    for entry in log.query(Utc::now() - chrono::Duration::minutes(1), None).await? {
        println!(
            "[{}] {} {}#{}: {}",
            entry.lookup_key(),
            entry.event_type_name(),
            entry.aggregate_type_name(),
            entry.aggregate_key(),
            entry.event_description()
        );
        for row in entry.detail_rows() {
            let indent = if row.parent_id.is_some() { "    " } else { "  " };
            println!(
                "{indent}{} ({}) = {}",
                row.property_name, row.property_type_name, row.string_value
            );
        }
    }

    Ok(())
}
