//! Error taxonomy and user-facing rendering.
//!
//! Control flow uses the typed errors of each module; rendering to an
//! admin-visible title and message is a separate, pure mapping so the same
//! error can be logged, stored on an order and shown as a notice without
//! carrying presentation state around.

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::client::ApiError;
use crate::email::MailError;
use crate::export::ExportError;
use crate::factory::FactoryError;
use crate::storage::StorageError;

/// Umbrella error for everything a workflow pass can run into.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ConnectorError {
    /// Short machine-readable code, stored next to the rendered message.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Api(ApiError::Status { status, .. }) => status.to_string(),
            Self::Api(ApiError::Transport(_)) => "transport".to_string(),
            Self::Api(ApiError::MissingKey) => "missing_key".to_string(),
            Self::Api(ApiError::Parse(_)) => "parse".to_string(),
            Self::Factory(FactoryError::WrongOrderItem { .. }) => "wrong_order_item".to_string(),
            Self::Factory(FactoryError::MissingProduct { .. }) => "missing_product".to_string(),
            Self::Adapter(_) => "adapter".to_string(),
            Self::Storage(_) => "storage".to_string(),
            Self::Mail(_) => "mail".to_string(),
            Self::Export(_) => "export".to_string(),
        }
    }
}

/// A rendered error: printable title and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub title: String,
    pub message: String,
}

impl UserMessage {
    fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Render an error to a printable title and message.
#[must_use]
pub fn render(error: &ConnectorError) -> UserMessage {
    match error {
        ConnectorError::Api(api) => render_api_error(api),
        ConnectorError::Factory(factory) => render_factory_error(factory),
        ConnectorError::Adapter(_) => UserMessage::new(
            "Order update failed",
            "The order data could not be saved. Please try again.",
        ),
        ConnectorError::Storage(storage) => render_storage_error(storage),
        ConnectorError::Mail(_) => UserMessage::new(
            "Email delivery failed",
            "The invoice email could not be sent. Please check the email configuration.",
        ),
        ConnectorError::Export(_) => UserMessage::new(
            "Export failed",
            "The invoices could not be exported.",
        ),
    }
}

fn render_api_error(error: &ApiError) -> UserMessage {
    match error {
        ApiError::Transport(transport) => render_transport_error(transport),
        ApiError::Status { status, body } => render_status_error(*status, body),
        ApiError::MissingKey | ApiError::Parse(_) => unknown_cause(),
    }
}

fn render_transport_error(error: &reqwest::Error) -> UserMessage {
    if error.is_timeout() {
        return UserMessage::new(
            "Request timeout",
            "The request to the server took too long. Please try again or increase the timeout limit.",
        );
    }
    if error.is_connect() {
        // TLS handshake failures surface as connect errors; tell them apart
        // by the error chain text.
        let chain = format!("{error:?}").to_lowercase();
        if chain.contains("certificate") || chain.contains("ssl") || chain.contains("tls") {
            return UserMessage::new(
                "SSL error",
                "A secure connection over SSL could not be established. Please check your server configuration.",
            );
        }
        return UserMessage::new(
            "Connection error",
            "Could not connect to the server application. Please check your internet connection.",
        );
    }
    unknown_cause()
}

fn render_status_error(status: u16, body: &str) -> UserMessage {
    match status {
        400 => UserMessage::new(
            "Missing configuration (Error 400)",
            "Please check that you have fully configured your billing provider.",
        ),
        401 => UserMessage::new(
            "Authentication failed (Error 401)",
            "Please check if the store key set in the settings is correct.",
        ),
        402 => UserMessage::new(
            "Upgrade required (Error 402)",
            "You cannot create any more invoices this month because your limit has been reached.",
        ),
        403 => UserMessage::new(
            "Authorization failed (Error 403)",
            "You do not have permission to access this invoice.",
        ),
        404 => UserMessage::new(
            "Invoice not found (Error 404)",
            "The invoice was not found. Are you sure this bill exists?",
        ),
        409 => UserMessage::new("Conflict occurred (Error 409)", detail_message(body)),
        415 => UserMessage::new(
            "Media type not supported (Error 415)",
            "The requested media type is not supported by Faktur Pro.",
        ),
        422 => UserMessage::new(
            "Processing failed (Error 422)",
            "The request processing failed. Please check the following possible causes of error:\n\
             - Does the order have all the necessary data for invoicing?\n\
             - Have you configured the taxes correctly in your online shop?\n\
             - Have you successfully established the connection to your billing provider?\n\
             - Can your billing provider process all the information in your order?\n\
             If the cause of the problem is unclear to you, please contact our support.",
        ),
        423 => UserMessage::new("Services have been blocked (Error 423)", detail_message(body)),
        429 => UserMessage::new(
            "Too many requests (Error 429)",
            "You sent too many requests to Faktur Pro in too short a time. Please wait a moment and then try again.",
        ),
        500 => UserMessage::new(
            "Server application error (Error 500)",
            "An unexpected server application error occurred. Please contact support.",
        ),
        501 => UserMessage::new(
            "Not yet available (Error 501)",
            "This function is not currently available, but will be implemented in the future.",
        ),
        503 => UserMessage::new(
            "Can not reach server (Error 503)",
            "The server application is temporarily unavailable. Please try again later.",
        ),
        _ => unknown_cause(),
    }
}

/// Error body shape the API uses for detail-bearing statuses.
#[derive(Debug, serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// Build the message for statuses whose body carries the actual reason.
fn detail_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
        message: body.to_string(),
        ..ErrorBody::default()
    });

    match parsed.error_code.as_str() {
        "missing_secrets" => {
            "Missing setup. Please check if you have fully configured your billing provider."
                .to_string()
        }
        "missing_settings" => {
            "Missing settings. Please check if you have fully configured your billing provider."
                .to_string()
        }
        "pause_services" => "The processing services of your account have been paused. Please check \
             if there are any outstanding payments to Faktur Pro or payments failed and update your \
             payment details if necessary."
            .to_string(),
        "service_not_active" => {
            "The connection to the service provider has been deactivated and must be reactivated."
                .to_string()
        }
        "service_not_ready" => "The connection to the service provider is not ready. Please check \
             if you have configured your billing provider correctly."
            .to_string(),
        code => {
            let message = match (parsed.message.is_empty(), code.is_empty()) {
                (false, false) => format!("{} (Code: {code})", parsed.message),
                (false, true) => parsed.message,
                (true, false) => code.to_string(),
                (true, true) => String::new(),
            };
            if message.is_empty() {
                "An error occurred.".to_string()
            } else {
                format!("An error occurred. Error: {message}")
            }
        }
    }
}

fn render_factory_error(error: &FactoryError) -> UserMessage {
    match error {
        FactoryError::WrongOrderItem { .. } => UserMessage::new(
            "Order item is not a product",
            "The order contains an item that is not a product. Please check the order and contact support.",
        ),
        FactoryError::MissingProduct { .. } => UserMessage::new(
            "Product for order item does not exist",
            "The order contains a line item for which the product does not exist (anymore). It is \
             not possible to create invoices that contain items whose product has already been deleted.",
        ),
    }
}

fn render_storage_error(error: &StorageError) -> UserMessage {
    match error {
        StorageError::WriteFile { .. } => {
            UserMessage::new("File write error", "The file could not be created.")
        }
        StorageError::ReadFile { .. } => {
            UserMessage::new("File read error", "The file could not be read.")
        }
        StorageError::CreateDir { .. } => {
            UserMessage::new("Folder write error", "The folder could not be created.")
        }
    }
}

fn unknown_cause() -> UserMessage {
    UserMessage::new(
        "Cause unclear",
        "An error with an unknown cause has occurred. Please contact support.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, body: &str) -> ConnectorError {
        ConnectorError::Api(ApiError::Status {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn test_status_catalogue_titles() {
        let cases = [
            (400, "Missing configuration (Error 400)"),
            (401, "Authentication failed (Error 401)"),
            (402, "Upgrade required (Error 402)"),
            (403, "Authorization failed (Error 403)"),
            (404, "Invoice not found (Error 404)"),
            (409, "Conflict occurred (Error 409)"),
            (415, "Media type not supported (Error 415)"),
            (422, "Processing failed (Error 422)"),
            (423, "Services have been blocked (Error 423)"),
            (429, "Too many requests (Error 429)"),
            (500, "Server application error (Error 500)"),
            (501, "Not yet available (Error 501)"),
            (503, "Can not reach server (Error 503)"),
        ];
        for (status, title) in cases {
            assert_eq!(render(&status_error(status, "")).title, title);
        }
    }

    #[test]
    fn test_unknown_status_falls_back() {
        let rendered = render(&status_error(418, ""));
        assert_eq!(rendered.title, "Cause unclear");
    }

    #[test]
    fn test_upgrade_required_message() {
        let rendered = render(&status_error(402, ""));
        assert!(rendered.title.contains("402"));
        assert!(rendered.message.contains("limit has been reached"));
    }

    #[test]
    fn test_locked_service_uses_body_detail() {
        let rendered = render(&status_error(
            423,
            r#"{"error_code":"pause_services","message":"ignored"}"#,
        ));
        assert!(rendered.message.contains("have been paused"));
    }

    #[test]
    fn test_conflict_with_unknown_code_composes_detail() {
        let rendered = render(&status_error(
            409,
            r#"{"error_code":"weird","message":"Duplicate invoice"}"#,
        ));
        assert_eq!(
            rendered.message,
            "An error occurred. Error: Duplicate invoice (Code: weird)"
        );
    }

    #[test]
    fn test_factory_errors_render() {
        let rendered = render(&ConnectorError::Factory(FactoryError::MissingProduct {
            name: "Widget".to_string(),
        }));
        assert_eq!(rendered.title, "Product for order item does not exist");
    }

    #[test]
    fn test_codes() {
        assert_eq!(status_error(402, "").code(), "402");
        assert_eq!(
            ConnectorError::Factory(FactoryError::WrongOrderItem { name: String::new() }).code(),
            "wrong_order_item"
        );
    }
}
