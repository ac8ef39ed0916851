// storefront/src/lib.rs

//! Storefront backend: a cookie-held cart, checkout against the XPay
//! gateway, and reconciliation of the gateway's callbacks.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;
