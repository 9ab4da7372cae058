//! Typed endpoint catalog.
//!
//! Each function builds the [`QueryDescriptor`](hms_core::QueryDescriptor) or
//! [`Mutation`](hms_core::Mutation) for one backend endpoint, with the
//! argument defaults, paths and tags the backend contract expects. Nothing
//! here performs I/O; pass the result to the coordinator.

pub mod account;
pub mod dashboard;
pub mod hospital;
pub mod patients;
