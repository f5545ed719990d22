//! Use cases over the domain ports.
//!
//! [`reconciler::PaymentReconciler`] owns everything that touches the payment ledger.
//! The other services are plain CRUD over listings, applications, and users.

pub mod access;
pub mod applications;
pub mod loans;
pub mod reconciler;
