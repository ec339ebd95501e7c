//! Integration tests for the Faktur Pro connector.
//!
//! The tests wire the real [`FakturClient`](fakturpro_connect::client::FakturClient)
//! against a wiremock API, feed orders in through the in-memory adapter and
//! drive the full automation workflow - the same path a platform event
//! takes in production, minus the platform.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fakturpro-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::{Mutex, Once};

use chrono::Utc;
use fakturpro_connect::adapter::MemoryOrder;
use fakturpro_connect::client::FakturClient;
use fakturpro_connect::config::ConnectorConfig;
use fakturpro_connect::email::{InvoiceMail, MailError, Mailer};
use fakturpro_connect::settings::InvoiceSettings;
use fakturpro_core::{
    LineEntry, OrderKind, OrderSnapshot, OrderStatus, ProductInfo, ProductLine, TaxBucket, TaxLine,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use url::Url;

static TRACING: Once = Once::new();

/// Install a test tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only so test output stays quiet.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// A connector configuration pointing at a mock API server.
///
/// # Panics
///
/// Panics when the mock server URI is not parseable, which would be a bug
/// in the test setup.
#[must_use]
pub fn test_config(server_uri: &str) -> ConnectorConfig {
    ConnectorConfig {
        server_uri: Url::parse(server_uri).expect("mock server uri parses"),
        shop_token: SecretString::from("integration-test-token"),
        shop_url: Url::parse("https://shop.example.com/").expect("static url parses"),
        locale: "de".to_string(),
        timeout_secs: 5,
        temp_dir: std::env::temp_dir().join("fakturpro-integration"),
    }
}

/// The real API client wired to a mock server.
///
/// # Panics
///
/// Panics when the HTTP client cannot be built from the test configuration.
#[must_use]
pub fn test_client(server_uri: &str) -> FakturClient {
    FakturClient::new(&test_config(server_uri)).expect("client builds")
}

/// Settings with creation and cancellation switched on for the usual states.
#[must_use]
pub fn automation_settings() -> InvoiceSettings {
    InvoiceSettings {
        create_invoices: true,
        cancel_invoices: true,
        invoice_for_states: vec![OrderStatus::Processing, OrderStatus::Completed],
        ..InvoiceSettings::default()
    }
}

/// A processing order with one 19%-taxed product line.
#[must_use]
pub fn sample_order(id: u64) -> MemoryOrder {
    let snapshot = OrderSnapshot {
        id,
        order_key: format!("wc_order_{id}"),
        order_number: id.to_string(),
        created_at: Utc::now(),
        status: OrderStatus::Processing,
        kind: OrderKind::Order,
        currency: "EUR".to_string(),
        total: Decimal::new(11_900, 2),
        payment_method: "paypal".to_string(),
        payment_method_title: "PayPal".to_string(),
        customer_id: 7,
        tax_lines: vec![TaxLine {
            rate_id: 1,
            name: "MwSt. 19%".to_string(),
            rate: Decimal::from(19),
        }],
        line_entries: vec![LineEntry::Product(ProductLine {
            name: "Widget".to_string(),
            quantity: 1,
            subtotal: Decimal::from(100),
            subtotal_tax: Decimal::from(19),
            total: Decimal::from(100),
            total_tax: Decimal::from(19),
            subtotal_taxes: vec![TaxBucket {
                rate_id: 1,
                amount: Decimal::from(19),
            }],
            product: Some(ProductInfo {
                sku: "SKU-1".to_string(),
                in_stock: true,
                ..ProductInfo::default()
            }),
            ..ProductLine::default()
        })],
        ..OrderSnapshot::default()
    };
    let mut order = MemoryOrder::new(snapshot);
    order.snapshot.billing.email = "customer@example.com".to_string();
    order.snapshot.billing.last_name = "Muster".to_string();
    order
}

/// A [`Mailer`] that records every mail instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<InvoiceMail>>,
}

impl RecordingMailer {
    /// All mails sent so far.
    ///
    /// # Panics
    ///
    /// Panics when the internal lock is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<InvoiceMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, mail: InvoiceMail) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(mail);
        Ok(())
    }
}
