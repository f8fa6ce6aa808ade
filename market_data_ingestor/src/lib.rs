//! Vendor-agnostic market data models and the HTTP providers that fill them.

pub mod models;
pub mod providers;
