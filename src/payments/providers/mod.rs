//! Payment acquirer implementations
//!
//! Concrete implementations of the PaymentAcquirer trait.

pub mod payfast;

pub use payfast::{PayfastConfig, PayfastProvider};
