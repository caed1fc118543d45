//! Azure Resource Manager access
//!
//! - [`auth`] - Token providers and the token cache
//! - [`http`] - Raw HTTP calls and ARM error decoding
//! - [`client`] - Authenticated client implementing the diagnostic settings API
//! - [`ids`] - Resource ID parsing and formatting

pub mod auth;
pub mod client;
pub mod http;
pub mod ids;

pub use client::AzureClient;
