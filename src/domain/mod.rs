//! Domain records and the ports through which the application layer reaches the
//! document store, the checkout gateway, and the identity provider.

pub mod application;
pub mod loan;
pub mod money;
pub mod payment;
pub mod ports;
pub mod session;
pub mod user;
