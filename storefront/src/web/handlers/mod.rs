// storefront/src/web/handlers/mod.rs

pub mod callback_handlers;
pub mod cart_handlers;
pub mod checkout_handlers;
