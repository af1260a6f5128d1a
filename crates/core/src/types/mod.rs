//! Core types for Atelier Linnea.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod checkout;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use checkout::{CartItem, DeliveryDetails, Measurements};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
