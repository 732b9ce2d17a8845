use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

string_key!(
    /// Caller-supplied subject reference, usually an email address.
    Identity
);

string_key!(
    /// Named category of caller; maps to a permission set.
    Role
);

string_key!(
    /// Named allowed action, e.g. `read:reports`.
    Permission
);

impl Identity {
    /// Parse a raw header value. Surrounding whitespace is dropped and an
    /// empty result means no identity was presented.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_parse_rejects_blank() {
        assert_eq!(Identity::parse(""), None);
        assert_eq!(Identity::parse("   \t"), None);
        assert_eq!(Identity::parse(" a@x.com "), Some(Identity::from("a@x.com")));
    }

    #[test]
    fn permissions_are_looked_up_by_str() {
        let set: HashSet<Permission> = ["edit:doc", "read:doc"].into_iter().map(Permission::from).collect();
        assert!(set.contains("edit:doc"));
        assert!(!set.contains("delete:doc"));
    }

    #[test]
    fn keys_serialize_as_plain_strings() {
        let role = Role::from("editor");
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"editor\"");
    }
}
