use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::booking::total_amount;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart row joined with the live state of its event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub image_url: Option<String>,
    pub event_date: NaiveDate,
    pub available_tickets: i32,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        total_amount(self.price, self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummaryLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartSummaryLine>,
    pub total_quantity: i32,
    pub total: Decimal,
}

impl From<Vec<CartLine>> for CartSummary {
    fn from(lines: Vec<CartLine>) -> Self {
        let total = lines.iter().map(CartLine::subtotal).sum();
        let total_quantity = lines
            .iter()
            .fold(0i32, |sum, line| sum.saturating_add(line.quantity));
        let items = lines
            .into_iter()
            .map(|line| CartSummaryLine {
                subtotal: line.subtotal(),
                line,
            })
            .collect();

        Self {
            items,
            total_quantity,
            total,
        }
    }
}
