//! `warden-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, ErrorClass};
pub use id::{OrganizationId, TenantId, UserId};
pub use value_object::ValueObject;
