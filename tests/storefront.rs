//! Resolves a small storefront object graph the way a GraphQL executor would: every parent at
//! one level asks for its children concurrently, and each level costs one store query.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;
use groupload_rs::{BatchFunction, Loader};

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: i64,
    user_id: i64,
    number: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct OrderItem {
    order_id: i64,
    product: &'static str,
    quantity: u32,
}

struct Store {
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    queries: Mutex<Vec<String>>,
}

impl Store {
    fn seeded() -> Self {
        Store {
            orders: vec![
                Order { id: 101, user_id: 1, number: "ORD-2024-001" },
                Order { id: 102, user_id: 1, number: "ORD-2024-002" },
                Order { id: 103, user_id: 2, number: "ORD-2024-003" },
                Order { id: 104, user_id: 2, number: "ORD-2024-004" },
            ],
            items: vec![
                OrderItem { order_id: 101, product: "Laptop", quantity: 1 },
                OrderItem { order_id: 101, product: "Mouse", quantity: 2 },
                OrderItem { order_id: 103, product: "Headphones", quantity: 1 },
                OrderItem { order_id: 104, product: "Keyboard", quantity: 1 },
            ],
            queries: Mutex::new(Vec::new()),
        }
    }

    fn log(&self, query: String) {
        self.queries.lock().unwrap().push(query);
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

struct RequestContext {
    store: Arc<Store>,
}

#[derive(Debug, thiserror::Error)]
#[error("store error")]
struct StoreError;

struct OrdersByUserId;

#[async_trait]
impl BatchFunction<i64, Order> for OrdersByUserId {
    type Context = Arc<RequestContext>;
    type Error = StoreError;

    async fn load(
        keys: &[i64],
        context: &Arc<RequestContext>,
    ) -> Result<Vec<(i64, Order)>, StoreError> {
        let store = &context.store;
        store.log(format!("orders where user_id in {:?}", keys));
        Ok(store
            .orders
            .iter()
            .filter(|o| keys.contains(&o.user_id))
            .map(|o| (o.user_id, o.clone()))
            .collect())
    }
}

struct ItemsByOrderId;

#[async_trait]
impl BatchFunction<i64, OrderItem> for ItemsByOrderId {
    type Context = Arc<RequestContext>;
    type Error = StoreError;

    async fn load(
        keys: &[i64],
        context: &Arc<RequestContext>,
    ) -> Result<Vec<(i64, OrderItem)>, StoreError> {
        let store = &context.store;
        store.log(format!("order_items where order_id in {:?}", keys));
        Ok(store
            .items
            .iter()
            .filter(|i| keys.contains(&i.order_id))
            .map(|i| (i.order_id, i.clone()))
            .collect())
    }
}

struct Loaders {
    orders_by_user: Loader<i64, Order>,
    items_by_order: Loader<i64, OrderItem>,
}

impl Loaders {
    fn for_request(store: Arc<Store>) -> Self {
        let context = Arc::new(RequestContext { store });
        Loaders {
            orders_by_user: Loader::new(OrdersByUserId {}, context.clone()),
            items_by_order: Loader::new(ItemsByOrderId {}, context),
        }
    }
}

#[tokio::test]
async fn users_with_orders_use_one_query() {
    let store = Arc::new(Store::seeded());
    let loaders = Loaders::for_request(store.clone());

    let orders = future::join_all([1, 2, 3].map(|id| loaders.orders_by_user.load(id))).await;
    let orders = orders.into_iter().collect::<Result<Vec<_>, _>>().unwrap();

    assert_eq!(orders.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 0]);
    assert_eq!(
        orders[0].iter().map(|o| o.number).collect::<Vec<_>>(),
        vec!["ORD-2024-001", "ORD-2024-002"]
    );
    assert_eq!(store.queries(), vec!["orders where user_id in [1, 2, 3]".to_owned()]);
}

#[tokio::test]
async fn nested_levels_cost_one_query_each() {
    let store = Arc::new(Store::seeded());
    let loaders = Loaders::for_request(store.clone());
    let loaders = &loaders;

    let users_orders = future::join_all([1, 2, 3].map(|user_id| async move {
        let orders = loaders.orders_by_user.load(user_id).await?;
        let items = future::join_all(orders.iter().map(|o| loaders.items_by_order.load(o.id)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, groupload_rs::LoadError>(orders.into_iter().zip(items).collect::<Vec<_>>())
    }))
    .await;

    let users_orders = users_orders.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
    let item_counts = users_orders
        .iter()
        .map(|orders| orders.iter().map(|(_, items)| items.len()).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    assert_eq!(item_counts, vec![vec![2, 0], vec![1, 1], vec![]]);
    let (first_order, first_items) = &users_orders[0][0];
    assert_eq!(first_order.id, 101);
    assert_eq!(
        first_items.iter().map(|i| (i.product, i.quantity)).collect::<Vec<_>>(),
        vec![("Laptop", 1), ("Mouse", 2)]
    );
    assert_eq!(
        store.queries(),
        vec![
            "orders where user_id in [1, 2, 3]".to_owned(),
            "order_items where order_id in [101, 102, 103, 104]".to_owned(),
        ]
    );
}

#[tokio::test]
async fn each_request_gets_fresh_loaders() {
    let store = Arc::new(Store::seeded());

    for _ in 0..2 {
        let loaders = Loaders::for_request(store.clone());
        assert_eq!(loaders.orders_by_user.load(2).await.unwrap().len(), 2);
    }
    assert_eq!(store.queries().len(), 2);
}
