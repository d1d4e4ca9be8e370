//! Models module
//!
//! Defines the traversal output shared by the catalog walk and the record
//! flattener. Wire objects returned by the catalog live in
//! [`crate::catalog::models`].

pub mod subscription;

pub use subscription::{AccessScope, FilterRef, SubscriptionNode};
