//! Invoice wire payload.
//!
//! The request body sent to the invoicing API when creating, cancelling or
//! refunding an invoice. Field names are part of the wire contract and must
//! not change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice request payload, built per order by the factory.
///
/// Never persisted; rebuilt from the order for every remote call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoicePayload {
    pub order_id: String,
    pub order_key: String,
    pub order_number: String,
    /// Unix timestamp of the order date.
    pub order_date: i64,
    pub invoice_currency: String,
    /// Whether the invoice is to be marked paid right away.
    pub invoice_paid: bool,
    pub taxes_included: bool,
    pub payment_method: String,
    pub payment_title: String,
    /// Unix timestamp of the payment, when the order was paid.
    pub payment_date: Option<i64>,
    pub base_country: String,
    pub customer_note: String,
    pub vat_exempt: bool,
    pub meta: Vec<PayloadMeta>,
    pub billing: BillingPayload,
    pub shipping: ShippingPayload,
    pub items: Vec<InvoiceLine>,
}

/// One order metadata entry passed through to the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub key: String,
    pub value: String,
}

/// Billing block of the invoice payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingPayload {
    pub customer_no: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    /// Full state name when the platform knows one, the raw code otherwise.
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub email: String,
    pub phone: String,
    pub salutation: Option<String>,
    pub vat_id: Option<String>,
    pub vat_exempt: bool,
}

/// Shipping block of the invoice payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingPayload {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub salutation: Option<String>,
    pub vat_id: Option<String>,
}

/// Line item type on the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    Product,
    Shipping,
    Fee,
    Discount,
    Credit,
}

/// One line of the invoice request.
///
/// Invariant: `price_net` plus the tax at `tax_rate` equals `price_gross`
/// within the configured rounding tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    #[serde(rename = "type")]
    pub item_type: LineItemType,
    /// Product flavor (`download`, `virtual`, `service`) when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    /// Article number (SKU for products, configured number for shipping).
    pub number: Option<String>,
    pub quantity: u32,
    /// Net unit price before discounts.
    pub price_net: Decimal,
    /// Gross unit price before discounts.
    pub price_gross: Decimal,
    /// Net unit price after discounts; products only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price_net: Option<Decimal>,
    /// Gross unit price after discounts; products only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price_gross: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub tax_name: Option<String>,
    /// Stock passthrough; products only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
}

impl InvoiceLine {
    /// A bare line of the given type with everything else empty.
    #[must_use]
    pub fn new(item_type: LineItemType, name: impl Into<String>) -> Self {
        Self {
            item_type,
            subtype: None,
            name: name.into(),
            description: None,
            unit: None,
            number: None,
            quantity: 1,
            price_net: Decimal::ZERO,
            price_gross: Decimal::ZERO,
            total_price_net: None,
            total_price_gross: None,
            tax_rate: None,
            tax_name: None,
            manage_stock: None,
            is_in_stock: None,
            stock_quantity: None,
        }
    }
}

/// Identifiers the API returns for a freshly created invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub uuid: String,
    pub number: String,
    /// Invoice date as the API reports it (unix timestamp).
    pub invoice_date: i64,
}

/// An invoice document fetched from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    /// Base64 encoded PDF contents.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_type_wire_names() {
        let line = InvoiceLine::new(LineItemType::Shipping, "DHL");
        let json = serde_json::to_value(&line).expect("serializes");
        assert_eq!(json["type"], "shipping");
        assert_eq!(json["quantity"], 1);
        // Product-only fields stay off the wire for other line types.
        assert!(json.get("total_price_net").is_none());
        assert!(json.get("manage_stock").is_none());
    }

    #[test]
    fn test_payload_field_names() {
        let payload = InvoicePayload {
            order_id: "42".to_string(),
            invoice_currency: "EUR".to_string(),
            ..InvoicePayload::default()
        };
        let json = serde_json::to_value(&payload).expect("serializes");
        assert_eq!(json["order_id"], "42");
        assert_eq!(json["invoice_currency"], "EUR");
        assert!(json["payment_date"].is_null());
        assert!(json["billing"]["vat_id"].is_null());
    }

    #[test]
    fn test_created_invoice_decodes() {
        let created: CreatedInvoice = serde_json::from_str(
            r#"{"uuid":"0b2e9a4e","number":"RE-1001","invoice_date":1700000000}"#,
        )
        .expect("decodes");
        assert_eq!(created.number, "RE-1001");
    }
}
