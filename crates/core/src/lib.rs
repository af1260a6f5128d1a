//! Atelier Linnea Core - Shared types library.
//!
//! This crate provides common types used across all Atelier Linnea components:
//! - `storefront` - Browser-facing checkout and account service
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and
//!   statuses, plus the checkout domain types (measurements, delivery
//!   details, cart items)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
