//! Order automation workflow.
//!
//! Re-entered on every relevant order event. Decides whether to create or
//! cancel an invoice, guarded by the per-operation waiting-time window and
//! the idempotency flags on the order's invoice metadata. There are no
//! locks: the waiting window plus the idempotent remote API is the whole
//! concurrency story.

use chrono::Utc;
use fakturpro_core::{OrderKind, ShopInfo};
use tracing::instrument;

use crate::adapter::{OrderAccess, RequestOp};
use crate::client::InvoiceApi;
use crate::error::{ConnectorError, render};
use crate::factory::InvoiceFactory;
use crate::settings::InvoiceSettings;

/// Result of one guarded operation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The remote call went through and the order was updated.
    Performed,
    /// The waiting-time window is still open; nothing was sent.
    Debounced,
}

/// State-driven invoice automation for platform orders.
///
/// Dependencies come in through the constructor; the workflow holds no
/// global state and can be instantiated per event.
#[derive(Debug, Clone)]
pub struct InvoiceAutomation<C> {
    settings: InvoiceSettings,
    client: C,
    shop: ShopInfo,
}

impl<C: InvoiceApi> InvoiceAutomation<C> {
    #[must_use]
    pub const fn new(settings: InvoiceSettings, client: C, shop: ShopInfo) -> Self {
        Self {
            settings,
            client,
            shop,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &InvoiceSettings {
        &self.settings
    }

    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Process an order event.
    ///
    /// Outstanding orders may get an invoice, cancelled or refunded orders
    /// may get their invoice cancelled. Failures never escape: they are
    /// logged and recorded on the order so the triggering platform event
    /// completes normally.
    ///
    /// Returns whether an action was taken (or attempted) for this order.
    #[instrument(skip_all, fields(order_id = order.order().id))]
    pub async fn process_order<O: OrderAccess + ?Sized>(&self, order: &mut O) -> bool {
        if order.order().kind != OrderKind::Order {
            tracing::debug!("skipping non-order record");
            return false;
        }

        let status = order.order().status.clone();
        if status.is_outstanding() {
            return self.maybe_create_invoice(order).await;
        }
        self.maybe_cancel_invoice(order).await
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create an invoice if every creation gate passes.
    ///
    /// Returns `false` without any remote call when a gate blocks.
    pub async fn maybe_create_invoice<O: OrderAccess + ?Sized>(&self, order: &mut O) -> bool {
        let meta = order.invoice_meta();
        if meta.has_invoice_key() || meta.has_error_message() {
            return false;
        }

        if !self.settings.create_invoices {
            tracing::debug!("invoice creation is disabled");
            return false;
        }

        let status = &order.order().status;
        if !self.settings.create_invoice_for_state(status) {
            tracing::debug!(status = %status, "order state not configured for invoicing");
            return false;
        }

        let method = order.order().payment_method.clone();
        if !self.settings.create_invoice_for_method(&method) {
            tracing::debug!(method, "payment method excluded from invoicing");
            return false;
        }

        let total = order.order().total;
        if !self.settings.create_invoice_for_value(total) {
            tracing::debug!(%total, "zero-value order not configured for invoicing");
            return false;
        }

        tracing::info!(
            order_id = order.order().id,
            status = %order.order().status,
            method,
            %total,
            "creating invoice"
        );
        self.create_invoice(order).await;
        true
    }

    /// Automatic creation: errors are captured on the order.
    async fn create_invoice<O: OrderAccess + ?Sized>(&self, order: &mut O) {
        match self.create_invoice_now(order).await {
            Ok(Attempt::Performed) => {
                tracing::info!(order_id = order.order().id, "invoice created");
            }
            Ok(Attempt::Debounced) => {
                tracing::debug!(order_id = order.order().id, "create request within waiting time");
            }
            Err(error) => {
                let rendered = render(&error);
                order.invoice_meta_mut().set_error_message(&format!(
                    "{}\n\n[Code: {}, message: {}]",
                    rendered.message,
                    error.code(),
                    error
                ));
                if let Err(save_error) = order.save() {
                    tracing::error!(%save_error, "failed to persist invoice error message");
                }
                tracing::error!(order_id = order.order().id, %error, "failed to create invoice");
            }
        }
    }

    /// Create the invoice, honoring only the waiting-time window.
    ///
    /// The manual path behind the admin "create invoice" button: state and
    /// method gates do not apply, but the debounce window still does.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`ConnectorError`] so the caller can render it
    /// as a notice.
    pub async fn create_invoice_now<O: OrderAccess + ?Sized>(
        &self,
        order: &mut O,
    ) -> Result<Attempt, ConnectorError> {
        let now = Utc::now();
        if !order.invoice_meta().waiting_time_passed(RequestOp::Create, now) {
            return Ok(Attempt::Debounced);
        }
        order.invoice_meta_mut().mark_requested(RequestOp::Create, now);
        order.save()?;

        let payload = InvoiceFactory::new(&self.settings, &self.shop).build(order)?;
        let created = self.client.create_invoice(&payload).await?;

        let meta = order.invoice_meta_mut();
        meta.uuid = Some(created.uuid);
        meta.number = Some(created.number);
        meta.date = Some(created.invoice_date);
        order.save()?;
        order.add_note("Invoice created");
        Ok(Attempt::Performed)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel the invoice if every cancellation gate passes.
    ///
    /// Returns `false` without any remote call when a gate blocks.
    pub async fn maybe_cancel_invoice<O: OrderAccess + ?Sized>(&self, order: &mut O) -> bool {
        if !order.invoice_meta().has_invoice_key() {
            return false;
        }

        if !self.settings.cancel_invoices {
            tracing::debug!("invoice cancellation is disabled");
            return false;
        }

        if order.invoice_meta().canceled {
            tracing::debug!(order_id = order.order().id, "invoice already cancelled");
            return false;
        }

        self.cancel_invoice(order).await;
        true
    }

    /// Automatic cancellation: errors are logged, not recorded.
    async fn cancel_invoice<O: OrderAccess + ?Sized>(&self, order: &mut O) {
        match self.cancel_invoice_now(order).await {
            Ok(Attempt::Performed) => {
                tracing::info!(order_id = order.order().id, "invoice cancelled");
            }
            Ok(Attempt::Debounced) => {
                tracing::debug!(order_id = order.order().id, "cancel request within waiting time");
            }
            Err(error) => {
                tracing::error!(order_id = order.order().id, %error, "failed to cancel invoice");
            }
        }
    }

    /// Cancel the invoice, honoring only the waiting-time window.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`ConnectorError`] so the caller can render it
    /// as a notice.
    pub async fn cancel_invoice_now<O: OrderAccess + ?Sized>(
        &self,
        order: &mut O,
    ) -> Result<Attempt, ConnectorError> {
        let now = Utc::now();
        if !order.invoice_meta().waiting_time_passed(RequestOp::Cancel, now) {
            return Ok(Attempt::Debounced);
        }
        order.invoice_meta_mut().mark_requested(RequestOp::Cancel, now);
        order.save()?;

        let key = order
            .invoice_meta()
            .invoice_key()
            .unwrap_or_default()
            .to_string();
        let payload = InvoiceFactory::new(&self.settings, &self.shop).build(order)?;
        self.client.cancel_invoice(&key, &payload).await?;

        order.add_note("Invoice canceled");
        order.invoice_meta_mut().canceled = true;
        order.save()?;
        Ok(Attempt::Performed)
    }
}

/// Clear all invoice metadata so the next eligible event starts fresh.
///
/// The manual escape hatch behind the admin reset button and the bulk reset
/// action; automation never resets on its own.
///
/// # Errors
///
/// Returns an error when the cleared metadata cannot be persisted.
pub fn reset_invoice<O: OrderAccess + ?Sized>(order: &mut O) -> Result<(), ConnectorError> {
    order.invoice_meta_mut().reset();
    order.save()?;
    Ok(())
}
