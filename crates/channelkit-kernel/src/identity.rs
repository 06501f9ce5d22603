//! Channel identities.
//!
//! An identity is a token that uniquely identifies a channel within one
//! platform. The kernel never knows concrete identity types: everything it
//! does goes through `dyn Identity`, and the concrete type is recovered by
//! downcasting only where a registered service asks for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Stable name of a concrete identity type.
///
/// Used as the wire tag of an encoded identity and as the registry key of
/// a [`Context`](crate::context::Context).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(pub String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A token that uniquely identifies a channel within a platform.
///
/// Implementations with native value equality can delegate the two
/// erased operations to [`value_eq`] and [`value_hash`]:
///
/// ```ignore
/// fn hash_value(&self) -> u64 { identity::value_hash(self) }
/// fn is_equal(&self, other: &dyn Identity) -> bool { identity::value_eq(self, other) }
/// fn to_payload(&self) -> serde_json::Result<Value> { serde_json::to_value(self) }
/// ```
pub trait Identity: Any + fmt::Debug + Send + Sync {
    /// Hash of the identity's own content.
    fn hash_value(&self) -> u64;

    /// Whether `other` refers to the same channel.
    ///
    /// Must return `false`, never fail, when `other` has a different
    /// concrete type.
    fn is_equal(&self, other: &dyn Identity) -> bool;

    /// A URL suitable for viewing the channel in a web view.
    fn web_view_url(&self, online: bool) -> Url;

    /// The short, human-readable location of the channel.
    ///
    /// Defaults to [`web_view_url`](Self::web_view_url) with the scheme and
    /// a leading `www.` removed.
    fn display_url(&self, online: bool) -> String {
        strip_scheme_and_www(&self.web_view_url(online))
    }

    /// A URL suitable for viewing the channel in a native app, if any.
    fn in_app_view_url(&self, online: bool) -> Option<Url>;

    /// The identity's own structured payload, as carried on the wire.
    fn to_payload(&self) -> serde_json::Result<Value>;
}

impl dyn Identity {
    pub fn as_any(&self) -> &dyn Any {
        self
    }

    /// The `TypeId` of the concrete identity behind this trait object.
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Identity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Identity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Cross-type equality for identities with native `PartialEq`.
///
/// Downcasts `other` to `T` and compares; any other concrete type is unequal.
pub fn value_eq<T>(this: &T, other: &dyn Identity) -> bool
where
    T: Identity + PartialEq,
{
    other.downcast_ref::<T>().is_some_and(|other| this == other)
}

/// Content hash for identities with native `Hash`.
pub fn value_hash<T: Hash + ?Sized>(this: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    this.hash(&mut hasher);
    hasher.finish()
}

fn strip_scheme_and_www(url: &Url) -> String {
    let full = url.as_str();
    let rest = match full.split_once("://") {
        Some((_, rest)) => rest,
        None => full.split_once(':').map_or(full, |(_, rest)| rest),
    };
    rest.strip_prefix("www.").unwrap_or(rest).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct Login(String);

    impl Identity for Login {
        fn hash_value(&self) -> u64 {
            value_hash(self)
        }

        fn is_equal(&self, other: &dyn Identity) -> bool {
            value_eq(self, other)
        }

        fn web_view_url(&self, _online: bool) -> Url {
            Url::parse("https://www.example.tv/")
                .and_then(|base| base.join(&self.0))
                .expect("static base must parse")
        }

        fn in_app_view_url(&self, online: bool) -> Option<Url> {
            let kind = if online { "stream" } else { "channel" };
            Url::parse(&format!("example://{kind}/{}", self.0)).ok()
        }

        fn to_payload(&self) -> serde_json::Result<Value> {
            serde_json::to_value(self)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct OtherLogin(String);

    impl Identity for OtherLogin {
        fn hash_value(&self) -> u64 {
            value_hash(self)
        }

        fn is_equal(&self, other: &dyn Identity) -> bool {
            value_eq(self, other)
        }

        fn web_view_url(&self, _online: bool) -> Url {
            Url::parse("https://other.example/").expect("static base must parse")
        }

        fn in_app_view_url(&self, _online: bool) -> Option<Url> {
            None
        }

        fn to_payload(&self) -> serde_json::Result<Value> {
            serde_json::to_value(self)
        }
    }

    #[test]
    fn equality_is_false_across_concrete_types() {
        let a = Login("same".into());
        let b = OtherLogin("same".into());
        assert!(!a.is_equal(&b));
        assert!(!b.is_equal(&a));
        assert!(a.is_equal(&Login("same".into())));
    }

    #[test]
    fn downcast_recovers_concrete_type() {
        let erased: &dyn Identity = &Login("abc".into());
        assert!(erased.is::<Login>());
        assert!(!erased.is::<OtherLogin>());
        assert_eq!(erased.downcast_ref::<Login>(), Some(&Login("abc".into())));
        assert_eq!(erased.concrete_type_id(), TypeId::of::<Login>());
    }

    #[test]
    fn display_url_strips_scheme_and_www() {
        let login = Login("streamer".into());
        assert_eq!(
            login.web_view_url(true).as_str(),
            "https://www.example.tv/streamer"
        );
        assert_eq!(login.display_url(true), "example.tv/streamer");
        assert_eq!(
            login.in_app_view_url(false).map(String::from),
            Some("example://channel/streamer".to_string())
        );
    }

    #[test]
    fn type_name_serializes_as_bare_string() {
        let name = TypeName::new("platform_a");
        assert_eq!(
            serde_json::to_string(&name).expect("type name must serialize"),
            "\"platform_a\""
        );
    }
}
