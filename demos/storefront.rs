use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use groupload_rs::{BatchFunction, LoadError, Loader, LoaderConfig, WorkerStats};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone)]
struct Order {
    id: i64,
    user_id: i64,
    number: &'static str,
    status: OrderStatus,
    total_cents: i64,
}

#[derive(Debug, Clone)]
struct OrderItem {
    order_id: i64,
    product: &'static str,
    quantity: u32,
}

/// In-memory stand-in for the relational store.
struct Store {
    users: HashMap<i64, &'static str>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
}

/// Immutable per-request context handed to every batch function.
struct RequestContext {
    viewer: &'static str,
    store: Arc<Store>,
}

#[derive(Debug, thiserror::Error)]
#[error("store unavailable")]
struct StoreUnavailable;

struct OrdersByUserId;

#[async_trait]
impl BatchFunction<i64, Order> for OrdersByUserId {
    type Context = Arc<RequestContext>;
    type Error = StoreUnavailable;

    async fn load(
        keys: &[i64],
        context: &Arc<RequestContext>,
    ) -> Result<Vec<(i64, Order)>, StoreUnavailable> {
        tracing::info!(viewer = context.viewer, ?keys, "fetching orders by user_id");
        Ok(context
            .store
            .orders
            .iter()
            .filter(|o| keys.contains(&o.user_id))
            .map(|o| (o.user_id, o.clone()))
            .collect())
    }

    fn check_key(key: &i64) -> Result<(), String> {
        if *key > 0 {
            Ok(())
        } else {
            Err(format!("not a user id: {}", key))
        }
    }
}

struct ItemsByOrderId;

#[async_trait]
impl BatchFunction<i64, OrderItem> for ItemsByOrderId {
    type Context = Arc<RequestContext>;
    type Error = StoreUnavailable;

    async fn load(
        keys: &[i64],
        context: &Arc<RequestContext>,
    ) -> Result<Vec<(i64, OrderItem)>, StoreUnavailable> {
        tracing::info!(viewer = context.viewer, ?keys, "fetching order_items by order_id");
        Ok(context
            .store
            .items
            .iter()
            .filter(|i| keys.contains(&i.order_id))
            .map(|i| (i.order_id, i.clone()))
            .collect())
    }
}

/// Loaders for one request. Built when the request arrives and dropped with it.
struct RequestLoaders {
    orders_by_user: Loader<i64, Order>,
    items_by_order: Loader<i64, OrderItem>,
}

impl RequestLoaders {
    fn new(context: Arc<RequestContext>) -> Self {
        Self {
            orders_by_user: Loader::with_config(
                OrdersByUserId {},
                context.clone(),
                LoaderConfig::default().with_name("orders_by_user"),
            ),
            items_by_order: Loader::with_config(
                ItemsByOrderId {},
                context,
                LoaderConfig::default().with_name("items_by_order").with_max_batch_size(100),
            ),
        }
    }
}

async fn resolve_user(
    loaders: &RequestLoaders,
    store: &Store,
    user_id: i64,
) -> Result<String, LoadError> {
    let name = store.users.get(&user_id).copied().unwrap_or("unknown");
    let orders = loaders.orders_by_user.load(user_id).await?;
    let items =
        future::try_join_all(orders.iter().map(|o| loaders.items_by_order.load(o.id))).await?;

    let mut out = format!("{} ({} orders)", name, orders.len());
    for (order, items) in orders.iter().zip(items) {
        let units: u32 = items.iter().map(|i| i.quantity).sum();
        let products = items.iter().map(|i| i.product).collect::<Vec<_>>().join(", ");
        out.push_str(&format!(
            "\n  {} [{}] ${}.{:02} {} unit(s): {}",
            order.number,
            order.status.label(),
            order.total_cents / 100,
            order.total_cents % 100,
            units,
            products
        ));
    }
    Ok(out)
}

fn order(
    id: i64,
    user_id: i64,
    number: &'static str,
    status: OrderStatus,
    total_cents: i64,
) -> Order {
    Order { id, user_id, number, status, total_cents }
}

fn seed() -> Store {
    Store {
        users: HashMap::from([(1, "John"), (2, "Jane"), (3, "Admin")]),
        orders: vec![
            order(1, 1, "ORD-2024-001", OrderStatus::Delivered, 142_997),
            order(2, 1, "ORD-2024-002", OrderStatus::Shipped, 8_999),
            order(3, 2, "ORD-2024-003", OrderStatus::Pending, 29_999),
            order(4, 2, "ORD-2024-004", OrderStatus::Delivered, 4_550),
            order(5, 3, "ORD-2024-005", OrderStatus::Cancelled, 12_000),
        ],
        items: vec![
            OrderItem { order_id: 1, product: "Laptop Pro", quantity: 1 },
            OrderItem { order_id: 1, product: "Wireless Mouse", quantity: 2 },
            OrderItem { order_id: 2, product: "USB-C Hub", quantity: 1 },
            OrderItem { order_id: 3, product: "Noise Cancelling Headphones", quantity: 1 },
            OrderItem { order_id: 4, product: "Coffee Beans", quantity: 3 },
            OrderItem { order_id: 5, product: "Desk Lamp", quantity: 1 },
        ],
    }
}

fn report(name: &str, stats: Result<WorkerStats, LoadError>) {
    match stats {
        Ok(stats) => println!(
            "{}: {} fetch(es) for {} requested key(s)",
            name,
            stats.fetch_calls(),
            stats.items_requested()
        ),
        Err(e) => eprintln!("{}: {}", name, e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(seed());
    let context = Arc::new(RequestContext { viewer: "admin@example.com", store: store.clone() });
    let loaders = RequestLoaders::new(context);

    // { users { name orders { number status items { product quantity } } } }
    let mut user_ids = store.users.keys().copied().collect::<Vec<_>>();
    user_ids.sort();
    let resolved =
        future::join_all(user_ids.iter().map(|id| resolve_user(&loaders, &store, *id))).await;
    for user in resolved {
        match user {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    report("orders_by_user", loaders.orders_by_user.stats().await);
    report("items_by_order", loaders.items_by_order.stats().await);

    if let Err(e) = loaders.orders_by_user.load(0).await {
        println!("rejected: {}", e);
    }
}
