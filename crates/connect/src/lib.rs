//! Faktur Pro Connect - invoice automation for platform orders.
//!
//! This crate turns platform order events into invoices at the Faktur Pro
//! API. The host platform layer feeds it orders through the [`adapter`]
//! contract; everything else is handled here:
//!
//! - [`settings`] - Typed shop configuration with centralized defaults
//! - [`factory`] - Pure order-to-invoice payload transformation
//! - [`client`] - Remote invoice API client
//! - [`workflow`] - Create/cancel automation with debounce guards
//! - [`email`] - Invoice delivery as or with customer emails
//! - [`export`] - Bulk invoice export and reset
//! - [`error`] - Error taxonomy and user-facing rendering
//!
//! # Example
//!
//! ```rust,no_run
//! use fakturpro_connect::adapter::MemoryOrder;
//! use fakturpro_connect::client::FakturClient;
//! use fakturpro_connect::config::ConnectorConfig;
//! use fakturpro_connect::settings::InvoiceSettings;
//! use fakturpro_connect::workflow::InvoiceAutomation;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectorConfig::from_env()?;
//! let client = FakturClient::new(&config)?;
//! let settings = InvoiceSettings::default();
//! let automation = InvoiceAutomation::new(settings, client, fakturpro_core::ShopInfo::default());
//!
//! let mut order = MemoryOrder::default();
//! automation.process_order(&mut order).await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod adapter;
pub mod client;
pub mod config;
pub mod email;
pub mod error;
pub mod export;
pub mod factory;
pub mod settings;
pub mod storage;
pub mod text;
pub mod workflow;
