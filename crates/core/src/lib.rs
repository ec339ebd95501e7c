//! Faktur Pro Core - Shared types library.
//!
//! This crate provides the common types used across the Faktur Pro connector
//! components:
//! - `connect` - Invoice factory, remote client and order automation
//! - `integration-tests` - End-to-end tests against a mock API
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no platform access. This keeps it lightweight and allows it to be
//! used anywhere, including inside the host platform's own adapter code.
//!
//! # Modules
//!
//! - [`types`] - Order snapshot model, invoice wire payload, statuses, money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
