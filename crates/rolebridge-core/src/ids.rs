//! Strongly Typed Identifiers
//!
//! Newtypes over the directory-issued string identifiers that flow through
//! reconciliation. Keeping group keys and profile ids apart stops a group name
//! from ever being handed to the profile service (and vice versa).
//!
//! # Example
//!
//! ```
//! use rolebridge_core::{GroupKey, ProfileId};
//!
//! let group = GroupKey::new("twilio-agent");
//! let profile = ProfileId::new("00u1abcd");
//!
//! fn requires_group(key: &GroupKey) -> &str {
//!     key.as_str()
//! }
//!
//! assert_eq!(requires_group(&group), "twilio-agent");
//! // requires_group(&profile); // This would not compile!
//! # let _ = profile;
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

/// Macro to define a strongly-typed string identifier.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the identifier and returns the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
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
    /// Key of a group in the internal store.
    ///
    /// Memberships are stored against the group's display name, which is also
    /// the key looked up in the [`RoleMapping`](crate::RoleMapping).
    GroupKey
);

define_id!(
    /// Identifier of a principal in the external directory.
    ///
    /// The same value identifies a group member internally and the profile
    /// whose role attribute is mirrored externally.
    ProfileId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_and_as_str() {
        let key = GroupKey::new("twilio-admin");
        assert_eq!(key.to_string(), "twilio-admin");
        assert_eq!(key.as_str(), "twilio-admin");
    }

    #[test]
    fn test_empty_detection() {
        assert!(ProfileId::new("").is_empty());
        assert!(!ProfileId::new("   ").is_empty());
        assert!(!ProfileId::new("00u1").is_empty());
    }

    #[test]
    fn test_borrow_allows_str_lookup() {
        let mut ids = HashSet::new();
        ids.insert(ProfileId::new("00u1"));
        assert!(ids.contains("00u1"));
        assert!(!ids.contains("00u2"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = ProfileId::new("00u1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00u1\"");

        let back: ProfileId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
