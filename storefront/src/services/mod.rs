// storefront/src/services/mod.rs

pub mod cart_service;
pub mod cart_store;
pub mod catalog;
pub mod checkout;
pub mod ledger;
pub mod notifier;
pub mod pricing;
pub mod xpay;
