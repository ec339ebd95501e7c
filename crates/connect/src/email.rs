//! Invoice delivery by email.
//!
//! Two delivery paths, selected by the `invoice_email` setting: a dedicated
//! invoice email sent through the [`Mailer`], or attaching the PDF to the
//! platform's own customer emails. Subjects, bodies and filenames support
//! placeholder tokens in both the `{token}` and the legacy `%token%` form.

use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::adapter::OrderAccess;
use crate::client::InvoiceApi;
use crate::error::ConnectorError;
use crate::settings::InvoiceSettings;
use crate::storage::Storage;

/// Default attachment filename when the configured one renders empty.
const DEFAULT_FILENAME: &str = "Rechnung";

/// Errors that can occur when building or sending invoice emails.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build the email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// An invoice email ready for delivery.
#[derive(Debug, Clone)]
pub struct InvoiceMail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    /// Path of the stored PDF to attach.
    pub attachment: Option<PathBuf>,
}

/// Outbound mail sender the platform (or SMTP) provides.
pub trait Mailer {
    /// Deliver one invoice email.
    fn send(&self, mail: InvoiceMail) -> impl Future<Output = Result<(), MailError>> + Send;
}

// =============================================================================
// Placeholders
// =============================================================================

/// Placeholder tokens available in subjects, bodies and filenames.
///
/// `for_filename` limits the set to tokens that are safe and useful in file
/// names; message bodies additionally get the order date tokens.
#[must_use]
pub fn placeholders<O: OrderAccess + ?Sized>(
    order: &O,
    settings: &InvoiceSettings,
    for_filename: bool,
) -> Vec<(String, String)> {
    let snapshot = order.order();
    let meta = order.invoice_meta();
    let company = snapshot.billing.company.clone();
    let last_name = snapshot.billing.last_name.clone();

    let mut tokens = vec![
        ("order_id".to_string(), snapshot.id.to_string()),
        (
            "order_no".to_string(),
            settings.order_number(&snapshot.order_number),
        ),
        (
            "invoice_no".to_string(),
            meta.number.clone().unwrap_or_default(),
        ),
        (
            "invoice_key".to_string(),
            meta.invoice_key().unwrap_or_default().to_string(),
        ),
        ("company".to_string(), company.clone()),
        (
            "company_or_name".to_string(),
            if company.is_empty() { last_name.clone() } else { company },
        ),
        ("first_name".to_string(), snapshot.billing.first_name.clone()),
        ("last_name".to_string(), last_name),
    ];
    push_date_tokens(
        &mut tokens,
        "invoice_date",
        meta.date.and_then(|ts| DateTime::from_timestamp(ts, 0)),
    );

    if !for_filename {
        push_date_tokens(&mut tokens, "order_date", Some(snapshot.created_at));
    }

    tokens
}

/// Add the `<prefix>`, `<prefix>_de`, `_day`, `_month`, `_year` tokens.
fn push_date_tokens(
    tokens: &mut Vec<(String, String)>,
    prefix: &str,
    date: Option<DateTime<Utc>>,
) {
    let formatted = |pattern: &str| {
        date.map(|d| d.format(pattern).to_string()).unwrap_or_default()
    };
    tokens.push((prefix.to_string(), formatted("%Y-%m-%d")));
    tokens.push((format!("{prefix}_de"), formatted("%d.%m.%Y")));
    tokens.push((format!("{prefix}_day"), formatted("%d")));
    tokens.push((format!("{prefix}_month"), formatted("%m")));
    tokens.push((format!("{prefix}_year"), formatted("%Y")));
}

/// Replace every token in both the `{token}` and the `%token%` form.
#[must_use]
pub fn replace_placeholders(text: &str, tokens: &[(String, String)]) -> String {
    let mut result = text.to_string();
    for (token, value) in tokens {
        result = result.replace(&format!("{{{token}}}"), value);
        result = result.replace(&format!("%{token}%"), value);
    }
    result
}

/// Attachment filename for an order, placeholders applied and sanitized.
#[must_use]
pub fn invoice_filename<O: OrderAccess + ?Sized>(
    order: &O,
    settings: &InvoiceSettings,
) -> String {
    let tokens = placeholders(order, settings, true);
    let mut name = replace_placeholders(settings.email_filename.trim(), &tokens);
    if name.is_empty() {
        name = DEFAULT_FILENAME.to_string();
    }
    // Path separators would escape the invoice directory.
    let name = name.replace(['/', '\\'], "_");
    format!("{name}.pdf")
}

// =============================================================================
// Invoice mailing
// =============================================================================

/// Sends invoices as or with customer emails.
#[derive(Debug, Clone)]
pub struct InvoiceMailer<C, M> {
    settings: InvoiceSettings,
    client: C,
    storage: Storage,
    mailer: M,
}

impl<C: InvoiceApi, M: Mailer> InvoiceMailer<C, M> {
    #[must_use]
    pub const fn new(settings: InvoiceSettings, client: C, storage: Storage, mailer: M) -> Self {
        Self {
            settings,
            client,
            storage,
            mailer,
        }
    }

    /// Send the dedicated invoice email when the settings ask for it.
    ///
    /// Gates: separate-email mode enabled, email not sent yet, order state
    /// in the allow-list, payment method not in the block-list. Failures
    /// are logged; the triggering event completes normally.
    #[instrument(skip_all, fields(order_id = order.order().id))]
    pub async fn process_mailing<O: OrderAccess + ?Sized>(&self, order: &mut O) -> bool {
        if !self.settings.send_invoice_as_email() {
            return false;
        }
        if order.invoice_meta().email_sent {
            return false;
        }
        if !self.settings.send_email_for_state(&order.order().status) {
            return false;
        }
        if !self.settings.send_email_for_method(&order.order().payment_method) {
            return false;
        }

        match self.send_invoice_as_email(order).await {
            Ok(()) => {
                order.add_note("Invoice sent as email.");
                order.invoice_meta_mut().email_sent = true;
                if let Err(error) = order.save() {
                    tracing::error!(%error, "failed to persist email-sent flag");
                }
                true
            }
            Err(error) => {
                tracing::error!(%error, "failed to send invoice email");
                false
            }
        }
    }

    async fn send_invoice_as_email<O: OrderAccess + ?Sized>(
        &self,
        order: &mut O,
    ) -> Result<(), ConnectorError> {
        let path = self.fetch_and_store(order).await?;

        let tokens = placeholders(order, &self.settings, false);
        let subject = replace_placeholders(
            self.settings.email_subject.as_deref().unwrap_or_default(),
            &tokens,
        );
        let text_body = replace_placeholders(&self.settings.email_content_text, &tokens);
        let html_body = replace_placeholders(&self.settings.email_content_html, &tokens);

        let mut to = vec![order.order().billing.email.clone()];
        to.extend(self.settings.email_recipients());

        let mail = InvoiceMail {
            to,
            cc: self.settings.email_copy_recipients(),
            bcc: self.settings.email_blind_copy_recipients(),
            subject,
            html_body: if html_body.is_empty() { text_body.clone() } else { html_body },
            text_body,
            attachment: Some(path),
        };
        self.mailer.send(mail).await?;
        Ok(())
    }

    /// Attach the invoice to a platform email when the settings ask for it.
    ///
    /// Called with the attachment list of the outgoing platform email;
    /// returns the list, extended with the invoice PDF when all gates pass.
    #[instrument(skip_all, fields(order_id = order.order().id, email_type))]
    pub async fn process_appending<O: OrderAccess + ?Sized>(
        &self,
        order: &mut O,
        email_type: &str,
        attachments: Vec<PathBuf>,
    ) -> Vec<PathBuf> {
        let to_customer = is_email_to_customer(email_type);

        // Never attach twice for the same order, except to an explicitly
        // requested invoice email.
        if order.invoice_meta().appended_to_email && to_customer && email_type != "customer_invoice"
        {
            return attachments;
        }
        if !self.settings.append_invoice_to_email() {
            return attachments;
        }
        if !self.settings.send_email_for_method(&order.order().payment_method) {
            return attachments;
        }
        if !self.settings.append_invoice_to_email_type(email_type)
            && email_type != "customer_invoice"
        {
            return attachments;
        }

        match self.fetch_and_store(order).await {
            Ok(path) => {
                let mut result = attachments;
                result.push(path);
                if to_customer {
                    order.add_note("Invoice sent as email.");
                    order.invoice_meta_mut().appended_to_email = true;
                    if let Err(error) = order.save() {
                        tracing::error!(%error, "failed to persist appended-to-email flag");
                    }
                }
                result
            }
            Err(error) => {
                tracing::error!(%error, "failed to attach invoice to email");
                attachments
            }
        }
    }

    /// Download the invoice PDF and store it for attaching.
    async fn fetch_and_store<O: OrderAccess + ?Sized>(
        &self,
        order: &O,
    ) -> Result<PathBuf, ConnectorError> {
        let key = order
            .invoice_meta()
            .invoice_key()
            .unwrap_or_default()
            .to_string();
        let document = self.client.get_invoice(&key).await?;
        let data = BASE64.decode(document.data.as_bytes()).map_err(|e| {
            ConnectorError::Api(crate::client::ApiError::Parse(format!(
                "Invoice data is not valid base64: {e}"
            )))
        })?;

        let filename = invoice_filename(order, &self.settings);
        let path = self.storage.invoice_dir(&key).join(filename);
        self.storage.store_file(&path, &data)?;
        Ok(path)
    }
}

/// Whether a platform email type goes to the customer.
#[must_use]
pub fn is_email_to_customer(email_type: &str) -> bool {
    email_type.starts_with("customer_")
}

// =============================================================================
// SMTP mailer
// =============================================================================

/// SMTP connection settings for the built-in mailer.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Sender address (From header).
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// [`Mailer`] delivering over SMTP.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    fn mailbox(address: &str) -> Result<Mailbox, MailError> {
        address
            .parse()
            .map_err(|_| MailError::InvalidAddress(address.to_string()))
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, mail: InvoiceMail) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(Self::mailbox(&self.from_address)?)
            .subject(mail.subject.clone());
        for to in &mail.to {
            builder = builder.to(Self::mailbox(to)?);
        }
        for cc in &mail.cc {
            builder = builder.cc(Self::mailbox(cc)?);
        }
        for bcc in &mail.bcc {
            builder = builder.bcc(Self::mailbox(bcc)?);
        }

        let mut multipart = MultiPart::alternative().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(mail.text_body.clone()),
        );
        if !mail.html_body.is_empty() {
            multipart = multipart.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(mail.html_body.clone()),
            );
        }

        let mut mixed = MultiPart::mixed().multipart(multipart);
        if let Some(path) = &mail.attachment {
            let data = std::fs::read(path).map_err(|_| {
                MailError::InvalidAddress(format!("attachment not readable: {}", path.display()))
            })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "invoice.pdf".to_string());
            mixed = mixed.singlepart(Attachment::new(filename).body(
                data,
                ContentType::parse("application/pdf").unwrap_or(ContentType::TEXT_PLAIN),
            ));
        }

        let message = builder.multipart(mixed)?;
        self.transport.send(message).await?;
        tracing::info!(subject = %mail.subject, "Invoice email sent");
        Ok(())
    }
}
