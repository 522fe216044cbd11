//! PayFast payment acquirer service
//!
//! Builds the PayFast payment form for checkout, and turns PayFast's
//! notify/return/cancel callbacks into transaction state changes.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;

pub use error::{AppError, AppResult};
