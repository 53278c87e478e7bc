//! # Commerce Clients
//!
//! Typed catalog and subscription clients layered on the authenticated
//! request pipeline from `core-session`. These are deliberately thin:
//! fetch and decode, nothing more. Authentication recovery (credential
//! renewal, forced logout) happens inside the pipeline and is invisible
//! here; an [`CommerceError::is_unauthenticated`] result means the user
//! must log in again.

pub mod catalog;
pub mod error;
pub mod subscriptions;
pub mod types;

pub use catalog::CatalogClient;
pub use error::{CommerceError, Result};
pub use subscriptions::SubscriptionClient;
pub use types::{Category, Page, Plan, Product, ProductFilter, Subscription};
