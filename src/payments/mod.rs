//! Payment acquirer integration module
//!
//! PayFast acquirer configuration, outbound form generation and processing
//! of the notifications PayFast posts back.

pub mod feedback;
pub mod notification;
pub mod providers;
pub mod signature;
pub mod traits;
pub mod types;

pub use feedback::TransactionProcessor;
pub use notification::PayfastNotification;
pub use traits::PaymentAcquirer;
