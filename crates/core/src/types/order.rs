//! Order snapshot model.
//!
//! This is the read contract the platform adapter fills in for the invoice
//! factory and the automation workflow. It deliberately enumerates every
//! field the connector consumes instead of forwarding arbitrary calls to the
//! platform's order object.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::{OrderKind, OrderStatus};

// =============================================================================
// Order
// =============================================================================

/// A read-only snapshot of a platform order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Platform order id.
    pub id: u64,
    /// Opaque order key issued by the platform at checkout.
    pub order_key: String,
    /// Customer-facing order number (may differ from the id).
    pub order_number: String,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was paid, if it was.
    pub date_paid: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub kind: OrderKind,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Grand total of the order.
    pub total: Decimal,
    /// Whether shop prices are entered tax-inclusive.
    pub prices_include_tax: bool,
    /// Payment gateway identifier (e.g. `paypal`).
    pub payment_method: String,
    /// Payment gateway display title.
    pub payment_method_title: String,
    pub customer_id: u64,
    pub customer_note: String,
    /// VAT exemption flag on the order itself.
    pub vat_exempt: bool,
    /// VAT exemption flag on the customer record.
    pub customer_vat_exempt: bool,
    pub billing: AddressBlock,
    pub shipping: AddressBlock,
    /// Order metadata bag, passed through to the invoice.
    pub meta: Vec<MetaEntry>,
    /// Customer metadata the VAT id lookup may fall back to.
    pub customer_meta: Vec<MetaEntry>,
    /// Tax lines applied to the order, in platform order.
    ///
    /// The first entry is the "first known rate" used as the fallback for
    /// untaxed shipping.
    pub tax_lines: Vec<TaxLine>,
    pub line_entries: Vec<LineEntry>,
    pub shipping_lines: Vec<ShippingLine>,
    pub fee_lines: Vec<FeeLine>,
    pub coupon_lines: Vec<CouponLine>,
    /// Named store credits applied to the order.
    pub credits: Vec<CreditUsed>,
}

impl OrderSnapshot {
    /// Look up a tax line by its platform rate id.
    #[must_use]
    pub fn tax_line(&self, rate_id: u64) -> Option<&TaxLine> {
        self.tax_lines.iter().find(|line| line.rate_id == rate_id)
    }

    /// A metadata value by key, order meta only.
    #[must_use]
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// A metadata value by key from the customer record.
    #[must_use]
    pub fn customer_meta_value(&self, key: &str) -> Option<&str> {
        self.customer_meta
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }
}

/// One entry of a metadata bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

impl MetaEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Billing or shipping address block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressBlock {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    /// State code as stored (`BY`, `NW`, ...), translated for the invoice.
    pub state: String,
    pub postcode: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub email: String,
    pub phone: String,
    /// Salutation title key as some platform extensions store it (1, 2).
    pub title_key: Option<u8>,
}

/// A tax rate applied somewhere on the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    pub rate_id: u64,
    /// Display name of the rate (e.g. `MwSt. 19%`).
    pub name: String,
    /// Percentage, e.g. `19.0`.
    pub rate: Decimal,
}

// =============================================================================
// Line items
// =============================================================================

/// Per-rate tax amount attached to a line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBucket {
    pub rate_id: u64,
    pub amount: Decimal,
}

/// One order line as the platform stores it.
///
/// Non-product entries exist so the factory can refuse orders containing
/// items it cannot invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineEntry {
    Product(ProductLine),
    Other { name: String },
}

/// A product-backed order line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductLine {
    pub name: String,
    pub quantity: u32,
    /// Line net total before discounts.
    pub subtotal: Decimal,
    /// Tax on the undiscounted line total.
    pub subtotal_tax: Decimal,
    /// Line net total after discounts.
    pub total: Decimal,
    /// Tax on the discounted line total.
    pub total_tax: Decimal,
    /// Tax buckets on the undiscounted amount, in platform order.
    pub subtotal_taxes: Vec<TaxBucket>,
    /// Tax buckets on the discounted amount, in platform order.
    pub total_taxes: Vec<TaxBucket>,
    /// The resolved product, absent when it was deleted after the sale.
    pub product: Option<ProductInfo>,
    /// The resolved variation, when the line points at one.
    pub variation: Option<VariationInfo>,
    /// Item-level metadata (variation attributes and extension data).
    pub meta: Vec<MetaEntry>,
}

impl ProductLine {
    /// The tax rate id that applies to this line.
    ///
    /// First bucket with a nonzero amount wins; when every bucket is zero
    /// the last bucket id is used. Subtotal buckets take precedence over
    /// total buckets.
    #[must_use]
    pub fn tax_rate_id(&self) -> Option<u64> {
        let buckets = if self.subtotal_taxes.is_empty() {
            &self.total_taxes
        } else {
            &self.subtotal_taxes
        };
        buckets
            .iter()
            .find(|bucket| !bucket.amount.is_zero())
            .or_else(|| buckets.last())
            .map(|bucket| bucket.rate_id)
    }
}

/// Product master data the factory reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub sku: String,
    /// Sales unit from the product metadata, when maintained.
    pub unit: Option<String>,
    pub description: String,
    pub short_description: String,
    /// Compact description some shops maintain as product metadata.
    pub mini_description: Option<String>,
    /// Subtitle supplied by a product-subtitle extension.
    pub subtitle: Option<String>,
    /// Secondary title supplied by a secondary-title extension.
    pub secondary_title: Option<String>,
    pub meta: Vec<MetaEntry>,
    pub downloadable: bool,
    pub r#virtual: bool,
    /// Marked as a service via product metadata.
    pub service: bool,
    pub manage_stock: bool,
    pub in_stock: bool,
    pub stock_quantity: Option<i64>,
}

impl ProductInfo {
    /// Meta keys checked for an alternative product title, most specific
    /// extension keys last so explicit fields win.
    const ALTERNATE_TITLE_KEYS: &'static [&'static str] = &[
        "_alternate_title",
        "alternate_title",
        "_alt_title",
        "alt_title",
        "_subtitle",
        "subtitle",
        "_alternate_name",
        "alternate_name",
        "_alt_name",
        "alt_name",
        "_secondary_name",
        "secondary_name",
        "wc_ps_subtitle",
        "_secondary_title",
        "secondary_title",
    ];

    /// Resolve the alternative product title from generic metadata.
    #[must_use]
    pub fn alternate_title(&self) -> Option<&str> {
        Self::ALTERNATE_TITLE_KEYS.iter().find_map(|key| {
            self.meta
                .iter()
                .find(|entry| entry.key == *key && !entry.value.is_empty())
                .map(|entry| entry.value.as_str())
        })
    }
}

/// Variation data for variable products.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariationInfo {
    pub description: String,
    /// Compact description maintained on the variation.
    pub mini_description: Option<String>,
    /// Attribute values of the variation (`Color: Red`, stored as values).
    pub attributes: Vec<String>,
}

/// A shipping line with its applied taxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingLine {
    pub name: String,
    /// Net shipping cost.
    pub total: Decimal,
    pub total_tax: Decimal,
    /// Applied tax buckets with a nonzero amount.
    pub taxes: Vec<TaxBucket>,
    /// Precomputed split amounts some tax extensions annotate the line with.
    pub split_taxes: Vec<SplitTax>,
}

/// Precomputed shipping tax split (one entry per rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTax {
    pub rate_id: u64,
    pub net_amount: Decimal,
    /// Gross amount the rate applies to.
    pub taxable_amount: Decimal,
}

/// A fee line with its applied taxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeLine {
    pub name: String,
    pub quantity: u32,
    /// Net fee amount.
    pub total: Decimal,
    /// Applied tax buckets with a nonzero amount.
    pub taxes: Vec<TaxBucket>,
}

/// A coupon applied to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponLine {
    pub name: String,
    pub code: String,
}

/// A named store credit applied to the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditUsed {
    pub name: String,
    pub amount: Decimal,
}

// =============================================================================
// Shop context
// =============================================================================

/// Shop-level platform data the factory needs besides the order itself.
///
/// Handed in as plain data so the factory stays a pure function of its
/// inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopInfo {
    /// ISO country code of the shop's base location.
    pub base_country: String,
    /// Full state names per country, keyed by country code then state code.
    pub states: std::collections::BTreeMap<String, std::collections::BTreeMap<String, String>>,
}

impl ShopInfo {
    /// Translate a state code to its full name, keeping the code when the
    /// platform has no name for it.
    #[must_use]
    pub fn state_name<'a>(&'a self, country: &str, state: &'a str) -> &'a str {
        if country.is_empty() || state.is_empty() {
            return state;
        }
        self.states
            .get(country)
            .and_then(|states| states.get(state))
            .map_or(state, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_title_prefers_earlier_keys() {
        let product = ProductInfo {
            meta: vec![
                MetaEntry::new("secondary_title", "Later"),
                MetaEntry::new("_subtitle", "Winner"),
            ],
            ..ProductInfo::default()
        };
        assert_eq!(product.alternate_title(), Some("Winner"));
    }

    #[test]
    fn test_alternate_title_skips_empty_values() {
        let product = ProductInfo {
            meta: vec![
                MetaEntry::new("_alternate_title", ""),
                MetaEntry::new("alt_title", "Fallback"),
            ],
            ..ProductInfo::default()
        };
        assert_eq!(product.alternate_title(), Some("Fallback"));
    }

    #[test]
    fn test_state_name_translation() {
        let mut states = std::collections::BTreeMap::new();
        states.insert(
            "DE".to_string(),
            [("BY".to_string(), "Bayern".to_string())].into_iter().collect(),
        );
        let shop = ShopInfo {
            base_country: "DE".to_string(),
            states,
        };
        assert_eq!(shop.state_name("DE", "BY"), "Bayern");
        assert_eq!(shop.state_name("DE", "XX"), "XX");
        assert_eq!(shop.state_name("", "BY"), "BY");
    }
}
