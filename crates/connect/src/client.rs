//! Faktur Pro API client.
//!
//! Stateless request/response wrapper around the shop invoice endpoints.
//! Every request carries the shop credentials, an identification header set
//! and a fresh trace id so failures can be correlated on the server side.
//!
//! # API Reference
//!
//! - `GET  shop/invoices/{key}` - fetch an invoice PDF (base64)
//! - `POST shop/invoices` - create an invoice
//! - `PUT  shop/invoices/{key}/complete` - complete an invoice
//! - `PUT  shop/invoices/{key}/cancel` - cancel an invoice
//! - `PUT  shop/invoices/{key}/refund` - refund an invoice

use std::sync::Arc;
use std::time::Duration;

use fakturpro_core::{CreatedInvoice, InvoiceDocument, InvoicePayload};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::config::ConnectorConfig;

/// Identifies this shop system towards the API.
const SHOP_SYSTEM: &str = "woocommerce";

/// Header carrying the per-request trace id.
const HEADER_TRACE_ID: &str = "X-Trace-Id";

/// Header identifying the shop system.
const HEADER_SHOP_SYSTEM: &str = "X-Shop-System";

/// Header identifying the shop by its public URL.
const HEADER_SHOP_URL: &str = "X-Shop-URL";

/// Errors that can occur when talking to the invoice API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An operation requiring an invoice key was called without one.
    #[error("invoice key required but missing")]
    MissingKey,

    /// The request never produced an HTTP response.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// HTTP status code, when the server produced one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Operations of the shop invoice API.
///
/// The automation workflow and mail handlers are generic over this trait so
/// tests can substitute a scripted client.
pub trait InvoiceApi {
    /// Fetch an invoice document by key.
    fn get_invoice(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<InvoiceDocument, ApiError>> + Send;

    /// Create a new invoice from the order payload.
    fn create_invoice(
        &self,
        payload: &InvoicePayload,
    ) -> impl Future<Output = Result<CreatedInvoice, ApiError>> + Send;

    /// Complete an invoice by key.
    fn complete_invoice(&self, key: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Cancel an invoice by key, sending the current order payload along.
    fn cancel_invoice(
        &self,
        key: &str,
        payload: &InvoicePayload,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Refund an invoice by key, sending the current order payload along.
    fn refund_invoice(
        &self,
        key: &str,
        payload: &InvoicePayload,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Faktur Pro API client.
#[derive(Clone)]
pub struct FakturClient {
    inner: Arc<FakturClientInner>,
}

struct FakturClientInner {
    client: reqwest::Client,
    base_uri: Url,
}

impl FakturClient {
    /// Create a new API client from the connector configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or a header value is
    /// not representable.
    pub fn new(config: &ConnectorConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.shop_token.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| ApiError::Parse(format!("Invalid token format: {e}")))?,
        );
        headers.insert(HEADER_SHOP_SYSTEM, HeaderValue::from_static(SHOP_SYSTEM));
        headers.insert(
            HEADER_SHOP_URL,
            HeaderValue::from_str(config.shop_url.as_str())
                .map_err(|e| ApiError::Parse(format!("Invalid shop URL: {e}")))?,
        );
        headers.insert(
            "Content-Type",
            HeaderValue::from_static("application/json"),
        );
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "Accept-Language",
            HeaderValue::from_str(&config.locale)
                .map_err(|e| ApiError::Parse(format!("Invalid locale: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(FakturClientInner {
                client,
                base_uri: config.server_uri.clone(),
            }),
        })
    }

    /// Send one request and classify the response.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&InvoicePayload>,
    ) -> Result<String, ApiError> {
        let url = self
            .inner
            .base_uri
            .join(path)
            .map_err(|e| ApiError::Parse(format!("Invalid request path {path}: {e}")))?;

        let trace_id = Uuid::new_v4().to_string();
        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .header(HEADER_TRACE_ID, &trace_id);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.inspect_err(|error| {
            tracing::warn!(%trace_id, %method, path, %error, "Invoice API request failed");
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
        ) {
            return Ok(text);
        }

        tracing::warn!(
            %trace_id,
            %method,
            path,
            status = status.as_u16(),
            "Invoice API returned an error status"
        );
        Err(ApiError::Status {
            status: status.as_u16(),
            body: text,
        })
    }

    /// Send a request and decode the JSON response body.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&InvoicePayload>,
    ) -> Result<T, ApiError> {
        let text = self.request(method, path, body).await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Parse(format!("Failed to parse response: {e}")))
    }

    fn require_key(key: &str) -> Result<(), ApiError> {
        if key.is_empty() {
            return Err(ApiError::MissingKey);
        }
        Ok(())
    }
}

impl InvoiceApi for FakturClient {
    #[instrument(skip(self))]
    async fn get_invoice(&self, key: &str) -> Result<InvoiceDocument, ApiError> {
        Self::require_key(key)?;
        self.request_json(Method::GET, &format!("shop/invoices/{key}"), None)
            .await
    }

    #[instrument(skip(self, payload), fields(order_id = %payload.order_id))]
    async fn create_invoice(&self, payload: &InvoicePayload) -> Result<CreatedInvoice, ApiError> {
        self.request_json(Method::POST, "shop/invoices", Some(payload))
            .await
    }

    #[instrument(skip(self))]
    async fn complete_invoice(&self, key: &str) -> Result<(), ApiError> {
        Self::require_key(key)?;
        self.request(Method::PUT, &format!("shop/invoices/{key}/complete"), None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, payload))]
    async fn cancel_invoice(&self, key: &str, payload: &InvoicePayload) -> Result<(), ApiError> {
        Self::require_key(key)?;
        self.request(
            Method::PUT,
            &format!("shop/invoices/{key}/cancel"),
            Some(payload),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self, payload))]
    async fn refund_invoice(&self, key: &str, payload: &InvoicePayload) -> Result<(), ApiError> {
        Self::require_key(key)?;
        self.request(
            Method::PUT,
            &format!("shop/invoices/{key}/refund"),
            Some(payload),
        )
        .await
        .map(|_| ())
    }
}

impl std::fmt::Debug for FakturClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakturClient")
            .field("base_uri", &self.inner.base_uri.as_str())
            .finish_non_exhaustive()
    }
}
