//! Newtype IDs for type-safe entity references.
//!
//! Identifiers in Waggle are opaque strings handed out by the hosted
//! backends: the auth provider assigns user ids and the document store
//! assigns dog profile ids. Use the `define_string_id!` macro to create
//! wrappers that prevent accidentally mixing the two.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use waggle_core::define_string_id;
/// define_string_id!(LitterId);
/// define_string_id!(KennelId);
///
/// let litter = LitterId::new("l1");
/// let kennel = KennelId::new("l1");
///
/// assert_eq!(litter.as_str(), kennel.as_str());
/// // These are different types, so this won't compile:
/// // let _: LitterId = kennel;
/// ```
#[macro_export]
macro_rules! define_string_id {
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
            /// Create a new ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(UserUid);
define_string_id!(DogId);

impl DogId {
    /// Maximum byte length of a document id accepted by the hosted store.
    pub const MAX_LENGTH: usize = 1500;

    /// Whether this id can address a single document.
    ///
    /// An empty id, one containing a path separator, or the reserved
    /// `.`/`..` names would address a collection or nothing at all.
    #[must_use]
    pub fn is_addressable(&self) -> bool {
        let id = self.as_str();
        !id.is_empty()
            && id.len() <= Self::MAX_LENGTH
            && !id.contains('/')
            && id != "."
            && id != ".."
    }
}
