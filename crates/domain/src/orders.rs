//! Order policy engine.
//!
//! Orders are created by authenticated users from catalog products. The
//! total is computed server-side from current prices and the header plus
//! all line items land in storage atomically.

use chrono::Utc;
use common::{Money, OrderId, ProductId, UserId};
use store::{Order, OrderFilter, OrderItem, OrderStatus, Store};

use crate::authz::{AccessRule, Actor, authorize};
use crate::error::{DomainError, Result};

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product: ProductId,
    pub quantity: u32,
}

/// Input for [`OrderService::create_order`].
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub items: Vec<OrderLine>,
    pub notes: String,
}

/// An order joined with its line items.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Service for order management.
pub struct OrderService<S> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for the actor.
    ///
    /// Every line must reference an existing product with quantity >= 1,
    /// and no product may appear twice. The total is the sum of current
    /// unit prices times quantities.
    #[tracing::instrument(skip(self, actor, req), fields(lines = req.items.len()))]
    pub async fn create_order(&self, actor: &Actor, req: OrderRequest) -> Result<OrderView> {
        authorize(actor, AccessRule::Authenticated)?;
        let user = actor.user_id().ok_or_else(|| {
            DomainError::Authentication("authentication required".to_string())
        })?;

        if req.items.is_empty() {
            return Err(DomainError::validation(
                "items",
                "an order needs at least one item",
            ));
        }

        let order_id = OrderId::new();
        let mut total = Money::zero();
        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            if line.quantity < 1 {
                return Err(DomainError::validation(
                    "quantity",
                    "quantity must be at least 1",
                ));
            }
            if items.iter().any(|i: &OrderItem| i.product == line.product) {
                return Err(DomainError::validation(
                    "items",
                    "a product may appear only once per order",
                ));
            }
            let product = self
                .store
                .product_by_id(line.product)
                .await?
                .ok_or_else(|| DomainError::not_found("product"))?;
            let line_total = product
                .price
                .checked_mul(line.quantity)
                .and_then(|t| total.checked_add(t))
                .ok_or_else(|| {
                    DomainError::validation("items", "order total is too large")
                })?;
            total = line_total;
            items.push(OrderItem {
                order: order_id,
                product: line.product,
                quantity: line.quantity,
            });
        }

        let order = Order {
            id: order_id,
            user,
            status: OrderStatus::New,
            total_sum: total,
            notes: req.notes,
            created_at: Utc::now(),
        };
        self.store
            .insert_order_with_items(order.clone(), items.clone())
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, total = %order.total_sum, "order created");
        Ok(OrderView { order, items })
    }

    /// Lists orders matching `filter`: staff see all orders, users only
    /// their own.
    #[tracing::instrument(skip(self, actor, filter))]
    pub async fn list_orders(&self, actor: &Actor, filter: &OrderFilter) -> Result<Vec<Order>> {
        authorize(actor, AccessRule::Authenticated)?;
        let scope = if actor.is_staff() {
            None
        } else {
            actor.user_id()
        };
        Ok(self.store.list_orders(scope, filter).await?)
    }

    /// Returns one order with its items.
    ///
    /// A non-owner gets `NotFound`, not `Permission`: the response does not
    /// reveal that the order id exists.
    #[tracing::instrument(skip(self, actor))]
    pub async fn get_order(&self, actor: &Actor, id: OrderId) -> Result<OrderView> {
        authorize(actor, AccessRule::Authenticated)?;
        let order = self
            .store
            .order_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order"))?;
        if !actor.is_staff() && actor.user_id() != Some(order.user) {
            return Err(DomainError::not_found("order"));
        }
        let items = self.store.items_for_order(id).await?;
        Ok(OrderView { order, items })
    }

    /// Moves an order to a new status. Staff only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        authorize(actor, AccessRule::StaffOnly)?;
        let mut order = self
            .store
            .order_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order"))?;
        self.store.set_order_status(id, status).await?;
        order.status = status;
        tracing::info!(order_id = %id, status = %status, "order status updated");
        Ok(order)
    }

    /// Orders are never deleted, by anyone.
    #[tracing::instrument(skip(self, actor))]
    pub async fn delete_order(&self, actor: &Actor, id: OrderId) -> Result<()> {
        let _ = id;
        authorize(actor, AccessRule::DenyAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::{Category, CategoryRepo, InMemoryStore, Product, ProductRepo};

    use super::*;

    fn service() -> (OrderService<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        (OrderService::new(store.clone()), store)
    }

    async fn seed_named_product(store: &InMemoryStore, title: &str, cents: i64) -> ProductId {
        if store.category_by_slug("food").await.unwrap().is_none() {
            store
                .insert_category(Category {
                    slug: "food".to_string(),
                    title: "Food".to_string(),
                })
                .await
                .unwrap();
        }
        let id = ProductId::new();
        store
            .insert_product(Product {
                id,
                title: title.to_string(),
                description: String::new(),
                price: Money::from_cents(cents),
                category_slug: "food".to_string(),
                image: None,
            })
            .await
            .unwrap();
        id
    }

    async fn seed_product(store: &InMemoryStore, cents: i64) -> ProductId {
        seed_named_product(store, "Apple", cents).await
    }

    fn request(lines: Vec<(ProductId, u32)>) -> OrderRequest {
        OrderRequest {
            items: lines
                .into_iter()
                .map(|(product, quantity)| OrderLine { product, quantity })
                .collect(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn total_is_price_times_quantity_summed() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let actor = Actor::user(UserId::new());

        let view = service
            .create_order(&actor, request(vec![(apple, 2)]))
            .await
            .unwrap();

        assert_eq!(view.order.total_sum.cents(), 1998);
        assert_eq!(view.order.total_sum.to_string(), "19.98");
        assert_eq!(view.order.status, OrderStatus::New);
        assert_eq!(view.items.len(), 1);
    }

    #[tokio::test]
    async fn create_order_validates_its_lines() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let actor = Actor::user(UserId::new());

        let err = service
            .create_order(&actor, request(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "items", .. }));

        let err = service
            .create_order(&actor, request(vec![(apple, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "quantity",
                ..
            }
        ));

        let err = service
            .create_order(&actor, request(vec![(apple, 1), (apple, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "items", .. }));

        let err = service
            .create_order(&actor, request(vec![(ProductId::new(), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = service
            .create_order(&Actor::Anonymous, request(vec![(apple, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Authentication(_)));

        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected() {
        let (service, store) = service();
        let pricey = seed_product(&store, i64::MAX).await;
        let actor = Actor::user(UserId::new());

        let err = service
            .create_order(&actor, request(vec![(pricey, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "items", .. }));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_partial_order() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let banana = seed_product(&store, 500).await;
        store.set_fail_after_first_item(true).await;

        let err = service
            .create_order(
                &Actor::user(UserId::new()),
                request(vec![(apple, 1), (banana, 1)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn users_see_only_their_own_orders() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let alice = Actor::user(UserId::new());
        let bob = Actor::user(UserId::new());

        let alices = service
            .create_order(&alice, request(vec![(apple, 1)]))
            .await
            .unwrap();
        service
            .create_order(&bob, request(vec![(apple, 3)]))
            .await
            .unwrap();

        let filter = OrderFilter::default();
        assert_eq!(service.list_orders(&alice, &filter).await.unwrap().len(), 1);
        assert_eq!(
            service
                .list_orders(&Actor::staff(UserId::new()), &filter)
                .await
                .unwrap()
                .len(),
            2
        );

        // Bob cannot see Alice's order, and is not told it exists.
        let err = service.get_order(&bob, alices.order.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        service.get_order(&alice, alices.order.id).await.unwrap();
        service
            .get_order(&Actor::staff(UserId::new()), alices.order.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn order_filter_applies_within_the_ownership_scope() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let actor = Actor::user(UserId::new());

        service
            .create_order(&actor, request(vec![(apple, 1)]))
            .await
            .unwrap();
        service
            .create_order(&actor, request(vec![(apple, 5)]))
            .await
            .unwrap();

        let filter = OrderFilter {
            total_sum_from: Some(2000),
            ..Default::default()
        };
        let orders = service.list_orders(&actor, &filter).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_sum.cents(), 4995);
    }

    #[tokio::test]
    async fn orders_filter_by_product_title() {
        let (service, store) = service();
        let apple = seed_named_product(&store, "Gala Apple", 999).await;
        let pear = seed_named_product(&store, "Pear", 500).await;
        let actor = Actor::user(UserId::new());

        service
            .create_order(&actor, request(vec![(apple, 1)]))
            .await
            .unwrap();
        service
            .create_order(&actor, request(vec![(pear, 1)]))
            .await
            .unwrap();

        let filter = OrderFilter {
            product: Some("apple".to_string()),
            ..Default::default()
        };
        let orders = service.list_orders(&actor, &filter).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_sum.cents(), 999);

        let filter = OrderFilter {
            product: Some("kiwi".to_string()),
            ..Default::default()
        };
        assert!(service.list_orders(&actor, &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_updates_are_staff_only() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let owner = Actor::user(UserId::new());
        let view = service
            .create_order(&owner, request(vec![(apple, 1)]))
            .await
            .unwrap();

        let err = service
            .update_status(&owner, view.order.id, OrderStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Permission(_)));

        let updated = service
            .update_status(&Actor::staff(UserId::new()), view.order.id, OrderStatus::Done)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Done);
        assert_eq!(
            service.get_order(&owner, view.order.id).await.unwrap().order.status,
            OrderStatus::Done
        );
    }

    #[tokio::test]
    async fn orders_are_never_deleted() {
        let (service, store) = service();
        let apple = seed_product(&store, 999).await;
        let owner = Actor::user(UserId::new());
        let view = service
            .create_order(&owner, request(vec![(apple, 1)]))
            .await
            .unwrap();

        for actor in [Actor::Anonymous, owner, Actor::staff(UserId::new())] {
            assert!(service.delete_order(&actor, view.order.id).await.is_err());
        }
        assert_eq!(store.order_count().await, 1);
    }
}
