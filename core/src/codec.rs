//! Request/response body codecs.
//!
//! # Design
//! Codecs convert between wire bytes and `serde_json::Value`, one codec per
//! content type. The typed step (`Value` to `T`) is shared by all codecs and
//! goes through `serde_path_to_error` so a mismatch reports the field path.
//! Binary payloads never reach a codec.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::descriptor::{APPLICATION_JSON, FORM_URLENCODED, TEXT_PLAIN};
use crate::error::{DecodeError, EncodeError};

/// Converts payloads of one content type.
pub trait Codec: Send + Sync {
    fn content_type(&self) -> &str;

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;
}

/// `application/json`. An empty body decodes as `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        serde_json::to_vec(value).map(Bytes::from).map_err(|e| EncodeError {
            content_type: APPLICATION_JSON.to_string(),
            message: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| DecodeError::at_root(e.to_string()))
    }
}

/// `application/x-www-form-urlencoded` for flat objects of scalars.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn content_type(&self) -> &str {
        FORM_URLENCODED
    }

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        let fail = |message: String| EncodeError {
            content_type: FORM_URLENCODED.to_string(),
            message,
        };
        let Value::Object(fields) = value else {
            return Err(fail("form bodies must be objects".to_string()));
        };
        let mut pairs = Vec::with_capacity(fields.len());
        for (name, field) in fields {
            let text = match field {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(fail(format!("field `{name}` is not a scalar")))
                }
            };
            pairs.push((name.as_str(), text));
        }
        serde_urlencoded::to_string(pairs)
            .map(Bytes::from)
            .map_err(|e| fail(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(bytes).map_err(|e| DecodeError::at_root(e.to_string()))?;
        let fields: Map<String, Value> = pairs
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        Ok(Value::Object(fields))
    }
}

/// `text/plain`: a body is one string.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn content_type(&self) -> &str {
        TEXT_PLAIN
    }

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        match value {
            Value::String(s) => Ok(Bytes::from(s.clone())),
            Value::Number(n) => Ok(Bytes::from(n.to_string())),
            Value::Bool(b) => Ok(Bytes::from(b.to_string())),
            _ => Err(EncodeError {
                content_type: TEXT_PLAIN.to_string(),
                message: "only scalar values can be sent as text".to_string(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|e| DecodeError::at_root(format!("body is not UTF-8: {e}")))
    }
}

/// Codecs by content type. `Default` registers JSON, form and text.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register `codec`, replacing any codec for the same content type.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs
            .insert(essence(codec.content_type()).to_string(), codec);
    }

    /// Codec for `content_type`, ignoring parameters such as `charset`.
    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(essence(content_type))
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.get(content_type).is_some()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(FormCodec));
        registry.register(Arc::new(TextCodec));
        registry
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.codecs.keys().collect();
        types.sort();
        f.debug_struct("CodecRegistry").field("content_types", &types).finish()
    }
}

/// `type/subtype` part of a content type, lowercased by convention of the
/// registered names.
fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

/// Convert a typed value into the codec-neutral representation.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, EncodeError> {
    serde_json::to_value(value).map_err(|e| EncodeError {
        content_type: APPLICATION_JSON.to_string(),
        message: e.to_string(),
    })
}

/// Deserialize `value` into `T`, reporting the field path on failure.
pub fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let message = err.inner().to_string();
        describe(path, message)
    })
}

fn describe(path: String, message: String) -> DecodeError {
    if let Some(field) = missing_field(&message) {
        let path = if path == "." {
            field.to_string()
        } else {
            format!("{path}.{field}")
        };
        return DecodeError {
            path,
            expected: None,
            message,
        };
    }
    let expected = message
        .split_once(", expected ")
        .map(|(_, expected)| expected.to_string());
    DecodeError {
        path,
        expected,
        message,
    }
}

fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| field)
}

/// True when `value` contains a NaN or infinite float anywhere.
///
/// `serde_json` encodes those as `null`, which would turn a bad number into
/// a missing one.
pub(crate) fn has_non_finite<T: Serialize + ?Sized>(value: &T) -> bool {
    matches!(value.serialize(&mut FiniteCheck), Err(Found::NonFinite))
}

struct FiniteCheck;

#[derive(Debug)]
enum Found {
    NonFinite,
    /// The value failed to serialize for another reason; `to_value` reports it.
    Other,
}

impl std::fmt::Display for Found {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Found::NonFinite => f.write_str("non-finite float"),
            Found::Other => f.write_str("serialization failed"),
        }
    }
}

impl std::error::Error for Found {}

impl serde::ser::Error for Found {
    fn custom<M: std::fmt::Display>(_msg: M) -> Self {
        Found::Other
    }
}

impl FiniteCheck {
    fn float(v: f64) -> Result<(), Found> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(Found::NonFinite)
        }
    }
}

impl<'a> serde::Serializer for &'a mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_i128(self, _: i128) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_u128(self, _: u128) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_f32(self, v: f32) -> Result<(), Found> {
        FiniteCheck::float(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> Result<(), Found> {
        FiniteCheck::float(v)
    }
    fn serialize_char(self, _: char) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_none(self) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Found> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<(), Found> {
        Ok(())
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _: &'static str, value: &T) -> Result<(), Found> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), Found> {
        value.serialize(self)
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_tuple_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, Found> {
        Ok(self)
    }
    fn serialize_struct_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self, Found> {
        Ok(self)
    }
}

impl serde::ser::SerializeSeq for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeTuple for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleStruct for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleVariant for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeMap for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Found> {
        key.serialize(&mut **self)
    }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeStruct for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

impl serde::ser::SerializeStructVariant for &mut FiniteCheck {
    type Ok = ();
    type Error = Found;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Result<(), Found> {
        value.serialize(&mut **self)
    }
    fn end(self) -> Result<(), Found> {
        Ok(())
    }
}

/// Deserialize a textual identifier that some servers send as a number.
///
/// Use with `#[serde(deserialize_with = "lenient_string::deserialize")]` or
/// `lenient_string::option` for `Option<String>` fields.
pub mod lenient_string {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Textual {
        Text(String),
        Integer(i64),
        Unsigned(u64),
        Float(f64),
    }

    impl From<Textual> for String {
        fn from(value: Textual) -> Self {
            match value {
                Textual::Text(s) => s,
                Textual::Integer(n) => n.to_string(),
                Textual::Unsigned(n) => n.to_string(),
                Textual::Float(n) => n.to_string(),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Textual::deserialize(deserializer).map(String::from)
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Option::<Textual>::deserialize(deserializer).map(|v| v.map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Inner {
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Outer {
        id: i64,
        inner: Inner,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn json_empty_body_is_null() {
        assert_eq!(JsonCodec.decode(b"").unwrap(), Value::Null);
        assert_eq!(JsonCodec.decode(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn json_syntax_error_is_decode_error() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert_eq!(err.path, ".");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let value = json!({"id": 1, "inner": {"name": "a", "extra": true}, "new": 5});
        let outer: Outer = decode_value(value).unwrap();
        assert_eq!(outer.inner.name, "a");
        assert!(outer.tags.is_empty());
    }

    #[test]
    fn missing_nested_field_reports_path() {
        let err = decode_value::<Outer>(json!({"id": 1, "inner": {}})).unwrap_err();
        assert_eq!(err.path, "inner.name");
        assert_eq!(err.expected, None);
    }

    #[test]
    fn missing_top_level_field_reports_name() {
        let err = decode_value::<Outer>(json!({"inner": {"name": "a"}})).unwrap_err();
        assert_eq!(err.path, "id");
    }

    #[test]
    fn type_mismatch_is_not_coerced() {
        let err = decode_value::<Outer>(json!({"id": "7", "inner": {"name": "a"}})).unwrap_err();
        assert_eq!(err.path, "id");
        assert_eq!(err.expected.as_deref(), Some("i64"));

        let err = decode_value::<Outer>(json!({"id": 7, "inner": {"name": 3}})).unwrap_err();
        assert_eq!(err.path, "inner.name");
        assert_eq!(err.expected.as_deref(), Some("a string"));
    }

    #[test]
    fn collection_element_path_is_indexed() {
        let err =
            decode_value::<Outer>(json!({"id": 1, "inner": {"name": "a"}, "tags": ["x", 2]}))
                .unwrap_err();
        assert_eq!(err.path, "tags[1]");
    }

    #[test]
    fn lenient_string_widens_numbers() {
        #[derive(Deserialize)]
        struct Ident {
            #[serde(deserialize_with = "lenient_string::deserialize")]
            id: String,
            #[serde(default, deserialize_with = "lenient_string::option")]
            alias: Option<String>,
        }
        let ident: Ident = decode_value(json!({"id": 42, "alias": "x"})).unwrap();
        assert_eq!(ident.id, "42");
        assert_eq!(ident.alias.as_deref(), Some("x"));

        let ident: Ident = decode_value(json!({"id": "abc"})).unwrap();
        assert_eq!(ident.id, "abc");
        assert!(ident.alias.is_none());

        assert!(decode_value::<Ident>(json!({"id": true})).is_err());
    }

    #[test]
    fn form_codec_encodes_scalars_and_skips_nulls() {
        let body = FormCodec
            .encode(&json!({"name": "Rex the dog", "status": "sold", "age": null}))
            .unwrap();
        assert_eq!(&body[..], b"name=Rex+the+dog&status=sold");

        let back = FormCodec.decode(&body).unwrap();
        assert_eq!(back, json!({"name": "Rex the dog", "status": "sold"}));

        assert!(FormCodec.encode(&json!({"nested": {"a": 1}})).is_err());
        assert!(FormCodec.encode(&json!("scalar")).is_err());
    }

    #[test]
    fn text_codec_round_trips_strings() {
        let body = TextCodec.encode(&json!("logged in user session:123")).unwrap();
        assert_eq!(
            TextCodec.decode(&body).unwrap(),
            json!("logged in user session:123")
        );
        assert!(TextCodec.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn registry_ignores_content_type_parameters() {
        let registry = CodecRegistry::default();
        assert!(registry.contains("application/json; charset=utf-8"));
        assert!(registry.contains(TEXT_PLAIN));
        assert!(!registry.contains("application/xml"));
        assert!(!CodecRegistry::empty().contains(APPLICATION_JSON));
    }
}
