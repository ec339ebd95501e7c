//! Shop configuration for invoice automation.
//!
//! One explicit struct with every default declared in one place. The host
//! platform persists these values however it likes and hands the loaded
//! struct to the factory, workflow and mailer. Gate semantics differ per
//! field and are part of the contract: `invoice_for_states` is an
//! allow-list, `no_invoice_for_methods` a block-list.

use fakturpro_core::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the product name on an invoice line is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineName {
    /// The plain product name as ordered.
    #[default]
    ProductName,
    /// Product name, dash, alternative title.
    ProductNameAndAlternateTitle,
    /// Alternative title, dash, product name.
    AlternateTitleAndProductName,
    /// Alternative title only (product name when there is none).
    AlternateTitle,
    /// Render the secondary-title template with `%title%` and
    /// `%secondary_title%` tokens.
    SecondaryTitleFormat,
}

/// Which text ends up in the invoice line description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineDescription {
    /// No description.
    #[default]
    None,
    /// The product short description.
    Short,
    /// Description of the product or variation the line points at.
    Article,
    /// Variation description, product description when empty.
    ArticleOrVariationInherit,
    /// Product description followed by the variation description.
    ArticleAndVariation,
    /// Product description only, never the variation's.
    ArticleStrict,
    /// Variation description only.
    Variation,
    /// The variation attribute values, comma-separated.
    VariationTitle,
    /// Item metadata as `key: value` lines, private keys excluded.
    MetaData,
    /// The compact description from product metadata.
    MiniDesc,
    /// The compact description from variation metadata.
    VariationMiniDesc,
    /// The alternative product title.
    AlternateTitle,
}

/// How invoices reach the customer by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceEmailMode {
    /// Attach the invoice to the platform's own order emails.
    #[default]
    Append,
    /// Send a dedicated invoice email.
    Separate,
    /// Do not email invoices.
    NoEmail,
}

/// All user-facing settings of the connector, with their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceSettings {
    /// Master switch for automatic invoice creation.
    pub create_invoices: bool,
    /// Master switch for automatic cancellation.
    pub cancel_invoices: bool,
    /// Order states that trigger creation (allow-list).
    pub invoice_for_states: Vec<OrderStatus>,
    /// Payment methods that never trigger creation (block-list).
    pub no_invoice_for_methods: Vec<String>,
    /// Payment methods whose invoices are marked paid right away.
    pub paid_for_methods: Vec<String>,
    /// Create invoices for orders with a zero total.
    pub zero_value_invoices: bool,
    /// Open PDFs in the browser instead of downloading.
    pub open_invoices: bool,
    /// Offer the invoice for download in the customer account.
    pub customer_link: bool,
    /// Meta field to prefer when looking up the customer VAT id.
    pub customer_vat_id_meta_name: String,
    pub line_name: LineName,
    pub line_description: LineDescription,
    /// Template for [`LineName::SecondaryTitleFormat`].
    pub secondary_title_format: String,
    /// Merge all store credits into a single invoice line.
    pub merge_credits: bool,
    /// Override for the name of shipping lines.
    pub article_name_shipping: Option<String>,
    /// Article number for shipping lines.
    pub article_number_shipping: Option<String>,
    /// Decimal places for product line prices; 0 disables rounding.
    pub price_num_decimals: u32,
    pub order_number_prefix: String,
    pub order_number_suffix: String,
    pub invoice_email: InvoiceEmailMode,
    /// Platform email types the invoice is attached to (append mode).
    pub email_to_append_to: Vec<String>,
    /// Order states that trigger the dedicated invoice email (allow-list).
    pub email_for_states: Vec<OrderStatus>,
    /// Payment methods that never get an invoice email (block-list).
    pub no_email_for_methods: Vec<String>,
    /// Platform email template to send through, `None` for the own mailer.
    pub email_template: Option<String>,
    /// Attachment filename, placeholder tokens allowed, `.pdf` appended.
    pub email_filename: String,
    /// Additional recipients, separated by whitespace, `;` or `,`.
    pub email_to: String,
    pub email_copy: String,
    pub email_blind_copy: String,
    pub email_subject: Option<String>,
    pub email_content_text: String,
    pub email_content_html: String,
    /// Recipient for aggregated bulk-operation error reports.
    pub send_error_mails_to: String,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            create_invoices: false,
            cancel_invoices: false,
            invoice_for_states: Vec::new(),
            no_invoice_for_methods: Vec::new(),
            paid_for_methods: Vec::new(),
            zero_value_invoices: false,
            open_invoices: false,
            customer_link: false,
            customer_vat_id_meta_name: String::new(),
            line_name: LineName::ProductName,
            line_description: LineDescription::None,
            secondary_title_format: "%title% (%secondary_title%)".to_string(),
            merge_credits: false,
            article_name_shipping: None,
            article_number_shipping: None,
            price_num_decimals: 2,
            order_number_prefix: String::new(),
            order_number_suffix: String::new(),
            invoice_email: InvoiceEmailMode::Append,
            email_to_append_to: vec!["customer_processing_order".to_string()],
            email_for_states: Vec::new(),
            no_email_for_methods: Vec::new(),
            email_template: None,
            email_filename: "Rechnung".to_string(),
            email_to: String::new(),
            email_copy: String::new(),
            email_blind_copy: String::new(),
            email_subject: None,
            email_content_text: String::new(),
            email_content_html: String::new(),
            send_error_mails_to: String::new(),
        }
    }
}

impl InvoiceSettings {
    /// Whether an invoice is to be created for this order state.
    #[must_use]
    pub fn create_invoice_for_state(&self, state: &OrderStatus) -> bool {
        self.invoice_for_states.contains(state)
    }

    /// Whether an invoice is to be created for this payment method.
    #[must_use]
    pub fn create_invoice_for_method(&self, method: &str) -> bool {
        !self.no_invoice_for_methods.iter().any(|m| m == method)
    }

    /// Whether an invoice is to be created for this order total.
    #[must_use]
    pub fn create_invoice_for_value(&self, value: Decimal) -> bool {
        !value.is_zero() || self.zero_value_invoices
    }

    /// All creation gates that depend on order data, combined.
    #[must_use]
    pub fn create_invoice_for(&self, state: &OrderStatus, method: &str, value: Decimal) -> bool {
        self.create_invoice_for_state(state)
            && self.create_invoice_for_method(method)
            && self.create_invoice_for_value(value)
    }

    /// Whether invoices for this payment method are marked paid on creation.
    #[must_use]
    pub fn mark_invoice_as_paid(&self, method: &str) -> bool {
        self.paid_for_methods.iter().any(|m| m == method)
    }

    /// Order number with the configured prefix and suffix applied.
    #[must_use]
    pub fn order_number(&self, number: &str) -> String {
        format!("{}{number}{}", self.order_number_prefix, self.order_number_suffix)
    }

    /// Whether invoices are attached to platform emails.
    #[must_use]
    pub const fn append_invoice_to_email(&self) -> bool {
        matches!(self.invoice_email, InvoiceEmailMode::Append)
    }

    /// Whether invoices are sent as a dedicated email.
    #[must_use]
    pub const fn send_invoice_as_email(&self) -> bool {
        matches!(self.invoice_email, InvoiceEmailMode::Separate)
    }

    /// Whether the invoice is attached to this platform email type.
    #[must_use]
    pub fn append_invoice_to_email_type(&self, email_type: &str) -> bool {
        self.email_to_append_to.iter().any(|t| t == email_type)
    }

    /// Whether the invoice email is sent for this order state.
    #[must_use]
    pub fn send_email_for_state(&self, state: &OrderStatus) -> bool {
        self.email_for_states.contains(state)
    }

    /// Whether the invoice email is sent for this payment method.
    #[must_use]
    pub fn send_email_for_method(&self, method: &str) -> bool {
        !self.no_email_for_methods.iter().any(|m| m == method)
    }

    /// Additional `To` recipients of the invoice email.
    #[must_use]
    pub fn email_recipients(&self) -> Vec<String> {
        parse_recipients(&self.email_to)
    }

    /// `Cc` recipients of the invoice email.
    #[must_use]
    pub fn email_copy_recipients(&self) -> Vec<String> {
        parse_recipients(&self.email_copy)
    }

    /// `Bcc` recipients of the invoice email.
    #[must_use]
    pub fn email_blind_copy_recipients(&self) -> Vec<String> {
        parse_recipients(&self.email_blind_copy)
    }
}

/// Split a recipient list on whitespace, `;` and `,` and keep everything
/// that parses as a mailbox address.
fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .map(str::trim)
        .filter(|part| !part.is_empty() && part.parse::<lettre::Address>().is_ok())
        .map(ToString::to_string)
        .collect()
}
