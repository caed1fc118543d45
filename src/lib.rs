//! Management of Azure Active Directory diagnostic settings
//!
//! Routes AAD audit and sign-in logs to an Event Hub, a Log Analytics
//! workspace or a storage account through the Azure Resource Manager.

pub mod azure;
pub mod config;
pub mod resource;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
