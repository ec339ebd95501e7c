//! Bulk invoice operations.
//!
//! Reset and ZIP export over a selection of orders. Export fetches the PDF
//! for every order, creating the invoice on the fly where none exists yet;
//! per-order failures are collected instead of aborting the batch and can
//! be reported to a configured recipient by email.

use std::io::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::adapter::OrderAccess;
use crate::client::InvoiceApi;
use crate::email::{InvoiceMail, Mailer};
use crate::error::{ConnectorError, UserMessage, render};
use crate::settings::InvoiceSettings;
use crate::workflow::{Attempt, InvoiceAutomation};

/// Errors while assembling the export archive.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("the invoices could not be exported: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("the invoices could not be exported: {0}")]
    Io(#[from] std::io::Error),
}

/// One failed order in a bulk run.
#[derive(Debug, Clone)]
pub struct BulkError {
    pub order_id: u64,
    pub rendered: UserMessage,
}

/// Result of a bulk export.
#[derive(Debug)]
pub struct ExportOutcome {
    /// The assembled ZIP archive.
    pub archive: Vec<u8>,
    /// Suggested download filename (`Rechnungen_<date>.zip`).
    pub filename: String,
    /// Orders whose invoice made it into the archive.
    pub exported: Vec<u64>,
    /// Orders that failed, with their rendered error.
    pub errors: Vec<BulkError>,
}

/// Bulk actions over a selection of orders.
#[derive(Debug, Clone)]
pub struct BulkActions<C> {
    automation: InvoiceAutomation<C>,
}

impl<C: InvoiceApi> BulkActions<C> {
    #[must_use]
    pub const fn new(automation: InvoiceAutomation<C>) -> Self {
        Self { automation }
    }

    /// Reset the invoice metadata of every selected order.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error; earlier orders stay reset.
    pub fn reset_invoices<'a, O, I>(orders: I) -> Result<(), ConnectorError>
    where
        O: OrderAccess + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut O>,
    {
        for order in orders {
            crate::workflow::reset_invoice(order)?;
        }
        Ok(())
    }

    /// Export the invoices of the selected orders as one ZIP archive.
    ///
    /// Orders without an invoice get one created first (their stored error
    /// message is cleared beforehand, as the action is an explicit retry).
    /// Failing orders are skipped and reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] only when the archive itself cannot be
    /// written; per-order failures never abort the batch.
    #[instrument(skip_all)]
    pub async fn export_invoices<'a, O, I>(
        &self,
        orders: I,
        now: DateTime<Utc>,
    ) -> Result<ExportOutcome, ExportError>
    where
        O: OrderAccess + ?Sized + 'a,
        I: IntoIterator<Item = &'a mut O>,
    {
        let mut buffer = Vec::new();
        let mut archive = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut exported = Vec::new();
        let mut errors = Vec::new();

        for order in orders {
            let order_id = order.order().id;
            match self.retrieve_invoice(order).await {
                Ok(Some(document)) => {
                    let filename = entry_filename(order_id, order.invoice_meta().number.as_deref());
                    archive.start_file(filename, options)?;
                    archive.write_all(&document)?;
                    exported.push(order_id);
                }
                Ok(None) => {
                    errors.push(BulkError {
                        order_id,
                        rendered: UserMessage {
                            title: "Invoice not found".to_string(),
                            message: "The invoice could not be retrieved.".to_string(),
                        },
                    });
                }
                Err(error) => {
                    errors.push(BulkError {
                        order_id,
                        rendered: render(&error),
                    });
                }
            }
        }

        archive.finish()?;

        Ok(ExportOutcome {
            archive: buffer,
            filename: format!("Rechnungen_{}.zip", now.format("%d_%m_%Y")),
            exported,
            errors,
        })
    }

    /// Fetch the invoice PDF for one order, creating the invoice on the fly
    /// when the order has none yet.
    ///
    /// Returns `Ok(None)` when creation was skipped by the waiting-time
    /// window, so no document can be delivered for this order.
    async fn retrieve_invoice<O: OrderAccess + ?Sized>(
        &self,
        order: &mut O,
    ) -> Result<Option<Vec<u8>>, ConnectorError> {
        if !order.invoice_meta().has_invoice_key() {
            // An explicit export is a retry: a stored failure must not block
            // the creation attempt.
            order.invoice_meta_mut().error_message.clear();
            if self.automation.create_invoice_now(order).await? == Attempt::Debounced {
                return Ok(None);
            }
        }

        let key = order
            .invoice_meta()
            .invoice_key()
            .unwrap_or_default()
            .to_string();
        let document = self.automation.client().get_invoice(&key).await?;
        let data = BASE64.decode(document.data.as_bytes()).map_err(|e| {
            ConnectorError::Api(crate::client::ApiError::Parse(format!(
                "Invoice data is not valid base64: {e}"
            )))
        })?;
        Ok(Some(data))
    }
}

/// Archive entry name for one invoice.
fn entry_filename(order_id: u64, invoice_number: Option<&str>) -> String {
    invoice_number.filter(|number| !number.is_empty()).map_or_else(
        || format!("Bestellung_{order_id}.pdf"),
        |number| format!("Rechnung_{}.pdf", number.replace([' ', '/', '\\'], "_")),
    )
}

/// Email the aggregated error list of a bulk run to the configured
/// recipient. No-op when no recipient is configured or nothing failed.
///
/// # Errors
///
/// Returns [`ConnectorError::Mail`] when delivery fails.
pub async fn send_error_report<M: Mailer>(
    mailer: &M,
    settings: &InvoiceSettings,
    action_name: &str,
    errors: &[BulkError],
    now: DateTime<Utc>,
) -> Result<(), ConnectorError> {
    let recipient = settings.send_error_mails_to.trim();
    if recipient.is_empty() || errors.is_empty() {
        return Ok(());
    }

    let subject = format!("Error with multiple action \"{action_name}\" on orders");
    let mut text_lines = vec![format!(
        "Errors occurred when running the multiple action \"{action_name}\" on {} at {} o'clock on the following orders:",
        now.format("%d.%m.%Y"),
        now.format("%H:%M"),
    )];
    for error in errors {
        text_lines.push(String::new());
        text_lines.push(format!("Order #{}: {}", error.order_id, error.rendered.title));
        text_lines.push(error.rendered.message.clone());
    }
    let text_body = text_lines.join("\n");

    mailer
        .send(InvoiceMail {
            to: vec![recipient.to_string()],
            cc: Vec::new(),
            bcc: Vec::new(),
            subject,
            html_body: String::new(),
            text_body,
            attachment: None,
        })
        .await?;
    Ok(())
}
