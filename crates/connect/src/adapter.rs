//! Order data adapter contract.
//!
//! The platform layer implements [`OrderAccess`] over its own order storage.
//! The contract enumerates exactly what the connector reads and writes - an
//! order snapshot, the invoice metadata bag, a save operation and order
//! notes - instead of forwarding arbitrary calls to the platform object.

use chrono::{DateTime, Duration, Utc};
use fakturpro_core::{CreditUsed, OrderSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::html_to_text;

/// Minimum interval between repeated remote attempts of the same operation
/// on the same order.
pub const WAITING_TIME_SECS: i64 = 120;

/// Meta keys checked for the billing VAT id when no preferred key is
/// configured. Order matters; entries cover the common VAT extensions.
const BILLING_VAT_ID_KEYS: &[&str] = &[
    "_billing_eu_vat_id",
    "billing_eu_vat_id",
    "_billing_vat",
    "billing_vat",
    "_billing_vat_id",
    "billing_vat_id",
    "_billing_eu_vat_number",
    "billing_eu_vat_number",
    "_vat_number",
    "vat_number",
    "VAT Number",
    "vat number",
    "_eu_vat_id",
    "eu_vat_id",
    "_vat_id",
    "vat_id",
    "_eu_vat_number",
    "eu_vat_number",
    "vatno",
    "wwp_wholesaler_tax_id",
];

/// Meta keys checked for the shipping VAT id.
const SHIPPING_VAT_ID_KEYS: &[&str] = &[
    "_shipping_eu_vat_id",
    "shipping_eu_vat_id",
    "_shipping_vat_id",
    "shipping_vat_id",
    "_shipping_eu_vat_number",
    "shipping_eu_vat_number",
    "_shipping_vat_number",
    "shipping_vat_number",
];

/// Error persisting order state through the platform layer.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to persist order metadata: {0}")]
    Persist(String),
}

/// Remote operations guarded by a waiting-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOp {
    Create,
    Complete,
    Cancel,
    Refund,
}

// =============================================================================
// Invoice metadata
// =============================================================================

/// The invoice metadata bag stored on an order.
///
/// Owned and mutated only by the workflow and mail handlers; the platform
/// layer persists it verbatim on `save`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceMeta {
    /// Invoice UUID at the remote service.
    pub uuid: Option<String>,
    /// Numeric invoice id written by early plugin versions.
    pub legacy_id: Option<String>,
    /// Invoice number as issued by the service.
    pub number: Option<String>,
    /// Invoice date as issued, unix timestamp.
    pub date: Option<i64>,
    /// Set once cancellation succeeded; never cancelled twice.
    pub canceled: bool,
    /// The dedicated invoice email went out.
    pub email_sent: bool,
    /// The invoice was attached to a platform customer email.
    pub appended_to_email: bool,
    /// Last failure description; non-empty blocks automatic retries.
    pub error_message: String,
    pub create_requested_at: Option<DateTime<Utc>>,
    pub complete_requested_at: Option<DateTime<Utc>>,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub refund_requested_at: Option<DateTime<Utc>>,
}

impl InvoiceMeta {
    /// Whether the order references a remote invoice (current or legacy id).
    #[must_use]
    pub const fn has_invoice_key(&self) -> bool {
        self.uuid.is_some() || self.legacy_id.is_some()
    }

    /// The invoice key, preferring the UUID over the legacy id.
    #[must_use]
    pub fn invoice_key(&self) -> Option<&str> {
        self.uuid.as_deref().or(self.legacy_id.as_deref())
    }

    #[must_use]
    pub fn has_error_message(&self) -> bool {
        !self.error_message.is_empty()
    }

    /// Store a failure description, flattening any HTML the server sent.
    pub fn set_error_message(&mut self, message: &str) {
        self.error_message = html_to_text(message);
    }

    /// Clear all invoice fields at once, waiting-time stamps included.
    ///
    /// After a reset the next eligible event may fire immediately.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn requested_at(&self, op: RequestOp) -> Option<DateTime<Utc>> {
        match op {
            RequestOp::Create => self.create_requested_at,
            RequestOp::Complete => self.complete_requested_at,
            RequestOp::Cancel => self.cancel_requested_at,
            RequestOp::Refund => self.refund_requested_at,
        }
    }

    /// Stamp the operation as requested now.
    pub const fn mark_requested(&mut self, op: RequestOp, now: DateTime<Utc>) {
        let slot = match op {
            RequestOp::Create => &mut self.create_requested_at,
            RequestOp::Complete => &mut self.complete_requested_at,
            RequestOp::Cancel => &mut self.cancel_requested_at,
            RequestOp::Refund => &mut self.refund_requested_at,
        };
        *slot = Some(now);
    }

    /// Whether the waiting time for the operation has passed.
    ///
    /// True when the operation was never requested or its stamp is older
    /// than [`WAITING_TIME_SECS`]. This window is the sole guard against
    /// double submission; there are no locks.
    #[must_use]
    pub fn waiting_time_passed(&self, op: RequestOp, now: DateTime<Utc>) -> bool {
        self.requested_at(op)
            .is_none_or(|requested| requested < now - Duration::seconds(WAITING_TIME_SECS))
    }
}

// =============================================================================
// Adapter contract
// =============================================================================

/// Read/write facade over one platform order.
pub trait OrderAccess {
    /// The order snapshot this adapter wraps.
    fn order(&self) -> &OrderSnapshot;

    fn invoice_meta(&self) -> &InvoiceMeta;

    fn invoice_meta_mut(&mut self) -> &mut InvoiceMeta;

    /// Persist the invoice metadata to the platform.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Persist`] when the platform write fails.
    fn save(&mut self) -> Result<(), AdapterError>;

    /// Append a note to the order history.
    fn add_note(&mut self, message: &str);

    /// Resolve the billing VAT id.
    ///
    /// The configured meta name wins, then the built-in key list; order
    /// metadata is searched before customer metadata.
    fn billing_vat_id(&self, preferred_meta_name: &str) -> Option<String> {
        if !preferred_meta_name.is_empty()
            && let Some(value) = self.vat_id_from_keys(&[preferred_meta_name])
        {
            return Some(value);
        }
        self.vat_id_from_keys(BILLING_VAT_ID_KEYS)
    }

    /// Search order metadata, then customer metadata, for the first nonempty
    /// value under any of the given keys.
    fn vat_id_from_keys(&self, keys: &[&str]) -> Option<String> {
        let order = self.order();
        for key in keys {
            if let Some(value) = order.meta_value(key)
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
        for key in keys {
            if let Some(value) = order.customer_meta_value(key)
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
        None
    }

    /// Resolve the shipping VAT id from order metadata.
    fn shipping_vat_id(&self) -> Option<String> {
        let order = self.order();
        SHIPPING_VAT_ID_KEYS.iter().find_map(|key| {
            order
                .meta_value(key)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        })
    }

    /// Billing salutation mapped from the stored title key.
    fn billing_salutation(&self) -> Option<String> {
        map_title(self.order().billing.title_key)
    }

    /// Shipping salutation mapped from the stored title key.
    fn shipping_salutation(&self) -> Option<String> {
        map_title(self.order().shipping.title_key)
    }

    /// Store credits applied to the order.
    fn credits_used(&self) -> Vec<CreditUsed> {
        self.order().credits.clone()
    }
}

/// Map a stored salutation title key to its display string.
fn map_title(key: Option<u8>) -> Option<String> {
    match key {
        Some(1) => Some("Herr".to_string()),
        Some(2) => Some("Frau".to_string()),
        _ => None,
    }
}

// =============================================================================
// In-memory adapter
// =============================================================================

/// In-memory [`OrderAccess`] implementation.
///
/// Reference adapter for tests and for hosts that deliver full order
/// payloads with their events.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrder {
    pub snapshot: OrderSnapshot,
    pub meta: InvoiceMeta,
    /// Order notes in the order they were added.
    pub notes: Vec<String>,
    /// How often `save` was called.
    pub saves: u32,
}

impl MemoryOrder {
    #[must_use]
    pub fn new(snapshot: OrderSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }
}

impl OrderAccess for MemoryOrder {
    fn order(&self) -> &OrderSnapshot {
        &self.snapshot
    }

    fn invoice_meta(&self) -> &InvoiceMeta {
        &self.meta
    }

    fn invoice_meta_mut(&mut self) -> &mut InvoiceMeta {
        &mut self.meta
    }

    fn save(&mut self) -> Result<(), AdapterError> {
        self.saves += 1;
        Ok(())
    }

    fn add_note(&mut self, message: &str) {
        self.notes.push(message.to_string());
    }
}
