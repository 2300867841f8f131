use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{CartItem, CartSummary, RequestContext};
use crate::store::Store;

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Adds tickets for an event to the caller's cart, merging with an existing line.
    pub async fn add_to_cart(
        &self,
        ctx: &RequestContext,
        event_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartItem> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be at least 1".into(),
            ));
        }
        let item = self
            .store
            .upsert_cart_item(ctx.user_id, event_id, quantity)
            .await?;
        info!(
            user_id = %ctx.user_id,
            event_id = %event_id,
            quantity = item.quantity,
            "Cart line updated"
        );
        Ok(item)
    }

    /// Overwrites the quantity of a cart line. Zero or less removes the line,
    /// in which case `None` is returned.
    pub async fn update_cart_item(
        &self,
        ctx: &RequestContext,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<Option<CartItem>> {
        let item = self.owned_item(ctx, cart_item_id).await?;
        let Some(item) = item else {
            if quantity <= 0 {
                return Ok(None);
            }
            return Err(ServiceError::not_found(format!("Cart item {}", cart_item_id)));
        };

        if quantity <= 0 {
            self.store.delete_cart_item(item.id).await?;
            debug!(cart_item_id = %item.id, "Cart line removed by zero quantity");
            return Ok(None);
        }

        self.store
            .set_cart_quantity(item.id, quantity)
            .await?
            .map(Some)
            .ok_or_else(|| ServiceError::not_found(format!("Cart item {}", cart_item_id)))
    }

    /// Idempotent: removing a line that is already gone succeeds.
    pub async fn remove_cart_item(
        &self,
        ctx: &RequestContext,
        cart_item_id: Uuid,
    ) -> ServiceResult<()> {
        if self.owned_item(ctx, cart_item_id).await?.is_some() {
            self.store.delete_cart_item(cart_item_id).await?;
        }
        Ok(())
    }

    pub async fn clear_cart(&self, ctx: &RequestContext) -> ServiceResult<u64> {
        let removed = self.store.clear_cart(ctx.user_id).await?;
        debug!(user_id = %ctx.user_id, removed, "Cart cleared");
        Ok(removed)
    }

    /// Cart lines priced from the events' current price.
    pub async fn list_cart(&self, ctx: &RequestContext) -> ServiceResult<CartSummary> {
        let lines = self.store.list_cart(ctx.user_id).await?;
        Ok(CartSummary::from(lines))
    }

    async fn owned_item(
        &self,
        ctx: &RequestContext,
        cart_item_id: Uuid,
    ) -> ServiceResult<Option<CartItem>> {
        match self.store.get_cart_item(cart_item_id).await? {
            Some(item) if !ctx.can_access(item.user_id) => Err(ServiceError::Forbidden(
                "cart item belongs to another user".into(),
            )),
            other => Ok(other),
        }
    }
}
