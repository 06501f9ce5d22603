//! Type-erased identities and their tagged wire form.
//!
//! [`AnyIdentity`] wraps exactly one [`Identity`] of any concrete type. It
//! encodes as an ordered pair
//!
//! ```text
//! [ "<type tag>", <payload> ]
//! ```
//!
//! where the payload shape is owned by the concrete type. The tag is not
//! stored in the identity: the caller supplies the type universe at every
//! encode ([`EncodingMappings`], keyed by runtime type) and every decode
//! ([`DecodingMappings`], keyed by tag).

use crate::error::CodecError;
use crate::identity::{Identity, TypeName};
use serde::de::{self, DeserializeOwned, DeserializeSeed, SeqAccess, Visitor};
use serde::ser::Error as _;
use serde::{Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Wraps one identity of any concrete type.
///
/// Equality and hashing include the concrete type: two identities of
/// different types are never equal, even when their payloads coincide.
#[derive(Clone)]
pub struct AnyIdentity {
    base: Arc<dyn Identity>,
}

impl AnyIdentity {
    pub fn new<I: Identity>(identity: I) -> Self {
        Self {
            base: Arc::new(identity),
        }
    }

    pub fn from_arc(base: Arc<dyn Identity>) -> Self {
        Self { base }
    }

    /// The wrapped identity.
    pub fn base(&self) -> &dyn Identity {
        self.base.as_ref()
    }

    pub fn concrete_type_id(&self) -> TypeId {
        self.base().concrete_type_id()
    }

    pub fn downcast_ref<T: Identity>(&self) -> Option<&T> {
        self.base().downcast_ref::<T>()
    }

    /// The tag the encoding map assigns to the wrapped identity's type.
    pub fn type_name<'m>(&self, mappings: &'m EncodingMappings) -> Option<&'m TypeName> {
        mappings.get(self.concrete_type_id())
    }

    /// Encode as `[tag, payload]`.
    pub fn encode(&self, mappings: &EncodingMappings) -> Result<Value, CodecError> {
        let tag = self
            .type_name(mappings)
            .ok_or_else(|| CodecError::UnsupportedIdentity {
                identity: format!("{:?}", self.base),
            })?;
        let payload = self
            .base
            .to_payload()
            .map_err(|source| CodecError::Payload {
                identity: format!("{:?}", self.base),
                message: source.to_string(),
            })?;
        Ok(Value::Array(vec![Value::String(tag.0.clone()), payload]))
    }

    /// Decode a `[tag, payload]` pair produced by [`encode`](Self::encode).
    pub fn decode(value: Value, mappings: &DecodingMappings) -> Result<Self, CodecError> {
        let Value::Array(items) = value else {
            return Err(CodecError::Shape(
                "expected a [tag, payload] identity pair".to_string(),
            ));
        };
        let [tag, payload]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
            CodecError::Shape(format!(
                "expected 2 elements in identity pair, found {}",
                items.len()
            ))
        })?;
        let Value::String(tag) = tag else {
            return Err(CodecError::Shape("identity tag must be a string".to_string()));
        };
        mappings.decode(&TypeName(tag), payload)
    }

    /// A `Serialize` view of this identity under `mappings`.
    pub fn tagged<'a>(&'a self, mappings: &'a EncodingMappings) -> Tagged<'a> {
        Tagged {
            identity: self,
            mappings,
        }
    }
}

impl fmt::Debug for AnyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.base, f)
    }
}

impl PartialEq for AnyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.concrete_type_id() == other.concrete_type_id() && self.base.is_equal(other.base())
    }
}

impl Eq for AnyIdentity {}

impl Hash for AnyIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.concrete_type_id().hash(state);
        self.base.hash_value().hash(state);
    }
}

impl<I: Identity> From<I> for AnyIdentity {
    fn from(identity: I) -> Self {
        Self::new(identity)
    }
}

/// Runtime type → tag, consulted when encoding.
#[derive(Debug, Clone, Default)]
pub struct EncodingMappings {
    names: HashMap<TypeId, TypeName>,
}

impl EncodingMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Identity>(&mut self, name: impl Into<TypeName>) -> &mut Self {
        self.names.insert(TypeId::of::<T>(), name.into());
        self
    }

    pub fn get(&self, type_id: TypeId) -> Option<&TypeName> {
        self.names.get(&type_id)
    }
}

type DecodeFn = fn(Value) -> serde_json::Result<AnyIdentity>;

fn decode_as<T>(payload: Value) -> serde_json::Result<AnyIdentity>
where
    T: Identity + DeserializeOwned,
{
    serde_json::from_value::<T>(payload).map(AnyIdentity::new)
}

/// Tag → concrete type decoder, consulted when decoding.
#[derive(Clone, Default)]
pub struct DecodingMappings {
    decoders: HashMap<TypeName, DecodeFn>,
}

impl DecodingMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&mut self, name: impl Into<TypeName>) -> &mut Self
    where
        T: Identity + DeserializeOwned,
    {
        self.decoders.insert(name.into(), decode_as::<T>);
        self
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.decoders.contains_key(name)
    }

    /// Decode `payload` as the type registered under `tag`.
    pub fn decode(&self, tag: &TypeName, payload: Value) -> Result<AnyIdentity, CodecError> {
        let decoder = self
            .decoders
            .get(tag)
            .ok_or_else(|| CodecError::UnsupportedType { tag: tag.clone() })?;
        decoder(payload).map_err(|source| CodecError::MalformedPayload {
            tag: tag.clone(),
            message: source.to_string(),
        })
    }
}

impl fmt::Debug for DecodingMappings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&TypeName> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("DecodingMappings")
            .field("tags", &tags)
            .finish()
    }
}

/// Matching encoding and decoding maps built from one registration per type.
#[derive(Debug, Clone, Default)]
pub struct IdentityTypes {
    encoding: EncodingMappings,
    decoding: DecodingMappings,
}

impl IdentityTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, name: impl Into<TypeName>) -> Self
    where
        T: Identity + DeserializeOwned,
    {
        self.insert::<T>(name);
        self
    }

    pub fn insert<T>(&mut self, name: impl Into<TypeName>) -> &mut Self
    where
        T: Identity + DeserializeOwned,
    {
        let name = name.into();
        self.encoding.insert::<T>(name.clone());
        self.decoding.insert::<T>(name);
        self
    }

    /// Add every registration from `other`, replacing tags and types that
    /// are already present.
    pub fn merge(&mut self, other: &IdentityTypes) -> &mut Self {
        self.encoding.names.extend(
            other
                .encoding
                .names
                .iter()
                .map(|(type_id, name)| (*type_id, name.clone())),
        );
        self.decoding.decoders.extend(
            other
                .decoding
                .decoders
                .iter()
                .map(|(name, decoder)| (name.clone(), *decoder)),
        );
        self
    }

    pub fn encoding(&self) -> &EncodingMappings {
        &self.encoding
    }

    pub fn decoding(&self) -> &DecodingMappings {
        &self.decoding
    }
}

/// `Serialize` view of an [`AnyIdentity`] bound to its encoding map.
#[derive(Debug, Clone, Copy)]
pub struct Tagged<'a> {
    identity: &'a AnyIdentity,
    mappings: &'a EncodingMappings,
}

impl Serialize for Tagged<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.identity
            .encode(self.mappings)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

/// Deserialize one `[tag, payload]` pair with any self-describing format.
#[derive(Debug, Clone, Copy)]
pub struct IdentitySeed<'a>(pub &'a DecodingMappings);

impl<'de> DeserializeSeed<'de> for IdentitySeed<'_> {
    type Value = AnyIdentity;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<AnyIdentity, D::Error> {
        deserializer.deserialize_tuple(2, PairVisitor(self.0))
    }
}

struct PairVisitor<'a>(&'a DecodingMappings);

impl<'de> Visitor<'de> for PairVisitor<'_> {
    type Value = AnyIdentity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [tag, payload] identity pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<AnyIdentity, A::Error> {
        let tag: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let tag = TypeName(tag);
        if !self.0.contains(&tag) {
            return Err(de::Error::custom(CodecError::UnsupportedType { tag }));
        }
        let payload: Value = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        self.0.decode(&tag, payload).map_err(de::Error::custom)
    }
}

/// Deserialize a sequence of `[tag, payload]` pairs.
#[derive(Debug, Clone, Copy)]
pub struct IdentityListSeed<'a>(pub &'a DecodingMappings);

impl<'de> DeserializeSeed<'de> for IdentityListSeed<'_> {
    type Value = Vec<AnyIdentity>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Vec<AnyIdentity>, D::Error> {
        deserializer.deserialize_seq(ListVisitor(self.0))
    }
}

struct ListVisitor<'a>(&'a DecodingMappings);

impl<'de> Visitor<'de> for ListVisitor<'_> {
    type Value = Vec<AnyIdentity>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of [tag, payload] identity pairs")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<AnyIdentity>, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(identity) = seq.next_element_seed(IdentitySeed(self.0))? {
            out.push(identity);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{value_eq, value_hash};
    use serde::Deserialize;
    use std::collections::HashSet;
    use url::Url;

    macro_rules! numeric_identity {
        ($name:ident, $site:literal) => {
            #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
            struct $name {
                id: u32,
            }

            impl Identity for $name {
                fn hash_value(&self) -> u64 {
                    value_hash(self)
                }

                fn is_equal(&self, other: &dyn Identity) -> bool {
                    value_eq(self, other)
                }

                fn web_view_url(&self, _online: bool) -> Url {
                    Url::parse(&format!("{}/{}", $site, self.id)).expect("test url must parse")
                }

                fn in_app_view_url(&self, _online: bool) -> Option<Url> {
                    None
                }

                fn to_payload(&self) -> serde_json::Result<Value> {
                    serde_json::to_value(self)
                }
            }
        };
    }

    numeric_identity!(PlatformA, "https://a.example");
    numeric_identity!(PlatformB, "https://b.example");

    fn types() -> IdentityTypes {
        IdentityTypes::new()
            .with::<PlatformA>("platform_a")
            .with::<PlatformB>("platform_b")
    }

    #[test]
    fn wire_form_is_tag_then_payload() {
        let types = types();
        let identity = AnyIdentity::new(PlatformA { id: 1 });
        let wire = serde_json::to_string(&identity.tagged(types.encoding()))
            .expect("identity must encode");
        insta::assert_snapshot!(wire, @r#"["platform_a",{"id":1}]"#);
    }

    #[test]
    fn encode_then_decode_yields_equal_identity() {
        let types = types();
        for identity in [
            AnyIdentity::new(PlatformA { id: 7 }),
            AnyIdentity::new(PlatformB { id: 7 }),
        ] {
            let wire = identity.encode(types.encoding()).expect("must encode");
            let back = AnyIdentity::decode(wire, types.decoding()).expect("must decode");
            assert_eq!(back, identity);
            assert!(back.base().is_equal(identity.base()));
        }
    }

    #[test]
    fn merge_combines_registrations() {
        let mut merged = IdentityTypes::new().with::<PlatformA>("platform_a");
        merged.merge(&IdentityTypes::new().with::<PlatformB>("platform_b"));

        let wire = AnyIdentity::new(PlatformB { id: 4 })
            .encode(merged.encoding())
            .expect("merged type must encode");
        assert_eq!(wire, serde_json::json!(["platform_b", {"id": 4}]));
        assert!(merged.decoding().contains(&TypeName::new("platform_a")));

        merged.merge(&IdentityTypes::new().with::<PlatformA>("a_renamed"));
        assert_eq!(
            AnyIdentity::new(PlatformA { id: 1 }).type_name(merged.encoding()),
            Some(&TypeName::new("a_renamed"))
        );
    }

    #[test]
    fn seed_decodes_from_any_deserializer() {
        let types = types();
        let mut de = serde_json::Deserializer::from_str(r#"["platform_b",{"id":3}]"#);
        let identity = IdentitySeed(types.decoding())
            .deserialize(&mut de)
            .expect("must decode");
        assert_eq!(identity.downcast_ref::<PlatformB>(), Some(&PlatformB { id: 3 }));
    }

    #[test]
    fn list_seed_decodes_mixed_types() {
        let types = types();
        let mut de = serde_json::Deserializer::from_str(
            r#"[["platform_a",{"id":1}],["platform_b",{"id":2}]]"#,
        );
        let identities = IdentityListSeed(types.decoding())
            .deserialize(&mut de)
            .expect("must decode");
        assert_eq!(
            identities,
            vec![
                AnyIdentity::new(PlatformA { id: 1 }),
                AnyIdentity::new(PlatformB { id: 2 }),
            ]
        );
    }

    #[test]
    fn encode_without_mapping_is_invalid_value() {
        let encoding = {
            let mut map = EncodingMappings::new();
            map.insert::<PlatformA>("platform_a");
            map
        };
        let err = AnyIdentity::new(PlatformB { id: 5 })
            .encode(&encoding)
            .expect_err("unmapped type must fail");
        assert!(
            matches!(&err, CodecError::UnsupportedIdentity { identity } if identity.contains("PlatformB"))
        );
        assert!(err.to_string().starts_with("invalid value"));
    }

    #[test]
    fn serializer_surfaces_unmapped_identity() {
        let encoding = EncodingMappings::new();
        let identity = AnyIdentity::new(PlatformA { id: 1 });
        let err = serde_json::to_string(&identity.tagged(&encoding))
            .expect_err("unmapped type must fail");
        assert!(err.to_string().contains("unsupported identity"));
    }

    #[test]
    fn unknown_tag_is_data_corrupted() {
        let types = types();
        let err = AnyIdentity::decode(
            serde_json::json!(["platform_z", {"id": 1}]),
            types.decoding(),
        )
        .expect_err("unknown tag must fail");
        assert!(
            matches!(&err, CodecError::UnsupportedType { tag } if tag.as_str() == "platform_z")
        );
        assert!(err.to_string().starts_with("data corrupted"));

        let mut de = serde_json::Deserializer::from_str(r#"["platform_z",{"id":1}]"#);
        let err = IdentitySeed(types.decoding())
            .deserialize(&mut de)
            .expect_err("unknown tag must fail");
        assert!(err.to_string().contains("platform_z"));
    }

    #[test]
    fn malformed_payload_cites_tag() {
        let types = types();
        let err = AnyIdentity::decode(
            serde_json::json!(["platform_a", {"login": "x"}]),
            types.decoding(),
        )
        .expect_err("malformed payload must fail");
        assert!(
            matches!(&err, CodecError::MalformedPayload { tag, .. } if tag.as_str() == "platform_a")
        );
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let types = types();
        for value in [
            serde_json::json!({"tag": "platform_a"}),
            serde_json::json!(["platform_a"]),
            serde_json::json!([1, {"id": 1}]),
        ] {
            let err = AnyIdentity::decode(value, types.decoding()).expect_err("must fail");
            assert!(matches!(err, CodecError::Shape(_)));
        }
    }

    #[test]
    fn equal_payloads_of_different_types_stay_distinct() {
        let a = AnyIdentity::new(PlatformA { id: 1 });
        let b = AnyIdentity::new(PlatformB { id: 1 });
        assert_ne!(a, b);

        let set: HashSet<AnyIdentity> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
