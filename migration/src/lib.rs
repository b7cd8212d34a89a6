//! Library crate for the account-data migration service: copies tenants,
//! identity settings, users, applications and account configuration from
//! one identity-platform account to another, and can wipe destination
//! data through the companion deletion runner.

pub mod features;
pub mod logging;
pub mod services;
pub mod utils;
