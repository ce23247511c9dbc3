//! Newtype IDs for type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate string-backed ID newtypes.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Catalog product identifier, unique within a cart.
    ///
    /// Catalogs key products by integer or by string; both are held as text
    /// so `ProductId::from(7u64) == ProductId::from("7")`.
    ProductId
);
define_id!(
    /// Authenticated user identifier.
    UserId
);
define_id!(
    /// Browser session identifier for guest carts.
    SessionId
);

impl From<u64> for ProductId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<u32> for ProductId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl From<i32> for ProductId {
    fn from(n: i32) -> Self {
        Self(n.to_string())
    }
}

/// Identifier of a rendered element, used for interaction hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids_agree() {
        assert_eq!(ProductId::from(42u64), ProductId::from("42"));
        assert_eq!(ProductId::from(42i32).as_str(), "42");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ProductId::new("sku-9")).unwrap();
        assert_eq!(json, "\"sku-9\"");
    }

    #[test]
    fn test_element_display() {
        assert_eq!(ElementId(3).to_string(), "#3");
    }
}
