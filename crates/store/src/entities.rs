//! Entity records as stored by the repositories.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, ReviewId, UserId};
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// Accounts start inactive; activation flips `is_active` once the user
/// proves control of the email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique login identifier.
    pub email: String,
    /// bcrypt hash of the password. Never the cleartext.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// A product category, keyed by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    /// Unique human-readable title.
    pub title: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    /// Unit price, never negative.
    pub price: Money,
    pub category_slug: String,
    /// Opaque reference to an externally stored image.
    pub image: Option<String>,
}

/// A product review. At most one per (author, product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub author: UserId,
    pub product: ProductId,
    pub text: String,
    /// 1..=5 inclusive.
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Just created, awaiting handling.
    #[default]
    New,
    /// Being handled by staff.
    InProgress,
    /// Fulfilled (terminal).
    Done,
    /// Cancelled (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Done => "done",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(OrderStatus::New),
            "in_progress" => Some(OrderStatus::InProgress),
            "done" => Some(OrderStatus::Done),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order header. `total_sum` is derived at creation, never client-supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub status: OrderStatus,
    pub total_sum: Money,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A line item of an order. Unique per (order, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order: OrderId,
    pub product: ProductId,
    /// Always >= 1.
    pub quantity: u32,
}

/// A wishlist row. Toggling a like flips `is_liked`; the row is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishListEntry {
    pub user: UserId,
    pub product: ProductId,
    pub is_liked: bool,
}

/// An issued session token. One row per login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

/// What an account token proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Proves control of the email at registration time.
    Activation,
    /// Authorizes setting a new password.
    PasswordReset,
}

impl TokenPurpose {
    /// Returns the purpose name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Parses a stored purpose name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activation" => Some(TokenPurpose::Activation),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

/// A single-use account token (activation or password reset).
///
/// Spent tokens stay in the table with `consumed = true` so reuse attempts
/// are distinguishable from unknown codes in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountToken {
    pub token: String,
    pub user: UserId,
    pub purpose: TokenPurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl AccountToken {
    /// Returns true if the token can still be used at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && now < self.expires_at
    }
}

/// Filter for product listings. All fields are conjunctive; `None` means
/// no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Exact category slug.
    pub category: Option<String>,
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Case-insensitive description substring.
    pub description: Option<String>,
    /// Minimum price in cents, inclusive.
    pub price_from: Option<i64>,
    /// Maximum price in cents, inclusive.
    pub price_to: Option<i64>,
}

impl ProductFilter {
    /// Returns true if `product` passes every set constraint.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref category) = self.category
            && &product.category_slug != category
        {
            return false;
        }
        if let Some(ref title) = self.title
            && !product.title.to_lowercase().contains(&title.to_lowercase())
        {
            return false;
        }
        if let Some(ref description) = self.description
            && !product
                .description
                .to_lowercase()
                .contains(&description.to_lowercase())
        {
            return false;
        }
        if let Some(from) = self.price_from
            && product.price.cents() < from
        {
            return false;
        }
        if let Some(to) = self.price_to
            && product.price.cents() > to
        {
            return false;
        }
        true
    }
}

/// Ordering for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductOrdering {
    Title,
    Price,
}

/// Filter for order listings, applied inside the caller's ownership scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Minimum total in cents, inclusive.
    pub total_sum_from: Option<i64>,
    /// Maximum total in cents, inclusive.
    pub total_sum_to: Option<i64>,
    /// Created at or after.
    pub created_after: Option<DateTime<Utc>>,
    /// Created at or before.
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of any line item's product title.
    pub product: Option<String>,
}

impl OrderFilter {
    /// Returns true if `order` passes every constraint on the header row.
    /// The `product` constraint needs the line items and is applied by the
    /// stores themselves.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(from) = self.total_sum_from
            && order.total_sum.cents() < from
        {
            return false;
        }
        if let Some(to) = self.total_sum_to
            && order.total_sum.cents() > to
        {
            return false;
        }
        if let Some(after) = self.created_after
            && order.created_at < after
        {
            return false;
        }
        if let Some(before) = self.created_before
            && order.created_at > before
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(title: &str, description: &str, cents: i64, category: &str) -> Product {
        Product {
            id: ProductId::new(),
            title: title.to_string(),
            description: description.to_string(),
            price: Money::from_cents(cents),
            category_slug: category.to_string(),
            image: None,
        }
    }

    #[test]
    fn order_status_roundtrip() {
        for status in [
            OrderStatus::New,
            OrderStatus::InProgress,
            OrderStatus::Done,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn token_purpose_roundtrip() {
        assert_eq!(
            TokenPurpose::parse("activation"),
            Some(TokenPurpose::Activation)
        );
        assert_eq!(
            TokenPurpose::parse("password_reset"),
            Some(TokenPurpose::PasswordReset)
        );
        assert_eq!(TokenPurpose::parse("other"), None);
    }

    #[test]
    fn token_usability() {
        let now = Utc::now();
        let token = AccountToken {
            token: "abc".to_string(),
            user: UserId::new(),
            purpose: TokenPurpose::Activation,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            consumed: false,
        };
        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + chrono::Duration::hours(2)));

        let spent = AccountToken {
            consumed: true,
            ..token
        };
        assert!(!spent.is_usable(now));
    }

    #[test]
    fn product_filter_empty_matches_all() {
        let filter = ProductFilter::default();
        assert!(filter.matches(&product("Mug", "ceramic", 999, "kitchen")));
    }

    #[test]
    fn product_filter_title_is_case_insensitive() {
        let filter = ProductFilter {
            title: Some("MUG".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&product("Coffee mug", "ceramic", 999, "kitchen")));
        assert!(!filter.matches(&product("Plate", "ceramic", 999, "kitchen")));
    }

    #[test]
    fn product_filter_price_bounds_are_inclusive() {
        let filter = ProductFilter {
            price_from: Some(500),
            price_to: Some(999),
            ..Default::default()
        };
        assert!(filter.matches(&product("A", "", 500, "c")));
        assert!(filter.matches(&product("B", "", 999, "c")));
        assert!(!filter.matches(&product("C", "", 1000, "c")));
        assert!(!filter.matches(&product("D", "", 499, "c")));
    }

    #[test]
    fn order_filter_total_bounds() {
        let order = Order {
            id: OrderId::new(),
            user: UserId::new(),
            status: OrderStatus::New,
            total_sum: Money::from_cents(1998),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let filter = OrderFilter {
            total_sum_from: Some(1000),
            total_sum_to: Some(2000),
            ..Default::default()
        };
        assert!(filter.matches(&order));

        let too_low = OrderFilter {
            total_sum_from: Some(2000),
            ..Default::default()
        };
        assert!(!too_low.matches(&order));
    }
}
