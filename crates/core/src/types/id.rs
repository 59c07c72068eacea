//! Newtype IDs for type-safe entity references.
//!
//! Identity and booking IDs are opaque strings assigned by the identity
//! provider or the data store. The `define_id!` macro wraps them so a
//! booking ID can never be passed where an owner ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use clinic_portal_core::define_id;
/// define_id!(OwnerId);
/// define_id!(SlotId);
///
/// let owner = OwnerId::new("uid-1");
/// let slot = SlotId::new("uid-1");
///
/// assert_eq!(owner.as_str(), slot.as_str());
/// // These are different types, so this won't compile:
/// // let _: OwnerId = slot;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Provider-assigned identity ID (the `uid` of a profile record).
define_id!(UserId);
// Data-store document ID of a booking.
define_id!(BookingId);
// Data-store document ID of a clinic service.
define_id!(ServiceId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_is_raw_string() {
        let id = UserId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = BookingId::from("bk-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bk-1\"");

        let back: BookingId = serde_json::from_str("\"bk-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_into_string() {
        let id = ServiceId::new(String::from("facial"));
        let raw: String = id.into();
        assert_eq!(raw, "facial");
    }
}
