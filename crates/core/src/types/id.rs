//! Newtype IDs for type-safe entity references.
//!
//! Two families of identifiers exist in this system:
//!
//! - Locally owned rows (users, addresses) use `i32` primary keys; the
//!   [`define_id!`] macro wraps those.
//! - Backend-owned entities (orders, products) are identified by opaque
//!   strings minted by the commerce backend or a payment provider; the
//!   [`define_handle!`] macro wraps those. An order id in particular is only
//!   ever a back-reference - this service never fabricates one.

/// Macro to define a type-safe ID wrapper around `i32`.
///
/// Creates a newtype with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use atelier_core::define_id;
/// define_id!(UserId);
/// define_id!(AddressId);
///
/// let user_id = UserId::new(1);
/// let address_id = AddressId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: UserId = address_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

/// Macro to define a type-safe wrapper around a backend-minted string id.
///
/// The wrapped string is opaque; the only guarantee is non-emptiness, which
/// `new` enforces by returning `None` for empty input (an empty order id in a
/// cookie or API response is always a bug upstream, never a valid handle).
#[macro_export]
macro_rules! define_handle {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a backend-minted identifier. Returns `None` for empty input.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Option<Self> {
                let id = id.into();
                if id.is_empty() { None } else { Some(Self(id)) }
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Locally owned rows
define_id!(UserId);
define_id!(AddressId);

// Backend-owned entities
define_handle!(OrderId);
define_handle!(ProductId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id_roundtrip() {
        let id = UserId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(UserId::from(42), id);
        assert_eq!(format!("{id}"), "42");
    }

    #[test]
    fn test_order_id_rejects_empty() {
        assert!(OrderId::new("").is_none());
        assert!(OrderId::new("ord_8f0c").is_some());
    }

    #[test]
    fn test_order_id_serde_transparent() {
        let id = OrderId::new("ord_8f0c").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ord_8f0c\"");

        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_order_id_display() {
        let id = OrderId::new("ord_8f0c").unwrap();
        assert_eq!(id.to_string(), "ord_8f0c");
        assert_eq!(id.as_str(), "ord_8f0c");
    }
}
