//! Resolves an operation's path, query string and headers from call
//! arguments.
//!
//! # Design
//! Arguments arrive as `serde_json::Value`s keyed by parameter name, so any
//! `Serialize` type can be passed and `Option::None` naturally becomes null.
//! Each value is checked against its declared `ValueType` here, before any
//! network activity, and rendered to its textual wire form.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{CollectionFormat, OperationDescriptor, ParamKind, ParameterSpec, ValueType};
use crate::error::{ApiError, EncodeError};
use crate::codec::has_non_finite;
use crate::http::{invalid_header, Headers};

/// One runtime argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Json(Value),
    Binary(Bytes),
}

impl ArgValue {
    fn is_null(&self) -> bool {
        matches!(self, ArgValue::Json(Value::Null))
    }
}

/// Arguments for one call, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<String, ArgValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and store it under `name`.
    ///
    /// NaN and infinite floats are rejected rather than stored as null.
    pub fn arg<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self, ApiError> {
        if has_non_finite(value) {
            return Err(ApiError::InvalidArgument {
                name: name.to_string(),
                reason: "NaN or infinite numbers cannot be sent".to_string(),
            });
        }
        let json = serde_json::to_value(value).map_err(|e| EncodeError {
            content_type: "application/json".to_string(),
            message: format!("argument `{name}`: {e}"),
        })?;
        self.values.insert(name.to_string(), ArgValue::Json(json));
        Ok(self)
    }

    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.values.insert(name.to_string(), ArgValue::Json(value));
        self
    }

    pub fn binary(mut self, name: &str, bytes: impl Into<Bytes>) -> Self {
        self.values.insert(name.to_string(), ArgValue::Binary(bytes.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Non-null value for `name`.
    fn present(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Output of [`bind`]: everything but the base URL and the encoded body.
#[derive(Debug, Clone)]
pub struct BoundRequest<'a> {
    /// Resolved path plus `?query` when any query value is present.
    pub path_and_query: String,
    /// Header parameters only; defaults are merged by the caller.
    pub headers: Headers,
    pub body: Option<&'a ArgValue>,
}

/// Resolve the URL path, query and header parameters of `op` from `args`.
pub fn bind<'a>(
    op: &OperationDescriptor,
    args: &'a Args,
    default_format: CollectionFormat,
) -> Result<BoundRequest<'a>, ApiError> {
    if let Some(unknown) = args.names().find(|name| op.parameter(name).is_none()) {
        return Err(ApiError::InvalidArgument {
            name: unknown.to_string(),
            reason: format!("not a parameter of `{}`", op.name()),
        });
    }

    let mut path = op.path_template().to_string();
    for param in op.parameters_of(ParamKind::Path) {
        let value = require_json(param, args)?
            .ok_or_else(|| missing(param))?;
        let rendered = render_joined(param, value, ",")?;
        path = path.replace(
            &format!("{{{}}}", param.name),
            &urlencoding::encode(&rendered),
        );
    }

    let mut query = Vec::new();
    for param in op.parameters_of(ParamKind::Query) {
        let Some(value) = require_json(param, args)? else {
            continue;
        };
        let format = param.collection_format.unwrap_or(default_format);
        query.extend(render_query(param, value, format)?);
    }

    let mut headers = Headers::new();
    for param in op.parameters_of(ParamKind::Header) {
        if let Some(value) = require_json(param, args)? {
            let rendered = render_joined(param, value, ",")?;
            if let Some(reason) = invalid_header(&param.name, &rendered) {
                return Err(invalid(param, reason));
            }
            headers.insert(param.name.clone(), rendered);
        }
    }

    let body = match op.body_parameter() {
        Some(param) => {
            let body = args.present(&param.name);
            if body.is_none() && param.required {
                return Err(missing(param));
            }
            if let Some(value) = body {
                check_body(param, value)?;
            }
            body
        }
        None => None,
    };

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{}", query.join("&"))
    };

    Ok(BoundRequest {
        path_and_query,
        headers,
        body,
    })
}

fn missing(param: &ParameterSpec) -> ApiError {
    ApiError::MissingParameter {
        name: param.name.clone(),
    }
}

fn invalid(param: &ParameterSpec, reason: impl Into<String>) -> ApiError {
    ApiError::InvalidArgument {
        name: param.name.clone(),
        reason: reason.into(),
    }
}

/// Non-null JSON value for a non-body parameter; `Ok(None)` when absent and
/// optional.
fn require_json<'a>(param: &ParameterSpec, args: &'a Args) -> Result<Option<&'a Value>, ApiError> {
    match args.present(&param.name) {
        Some(ArgValue::Json(value)) => Ok(Some(value)),
        Some(ArgValue::Binary(_)) => Err(invalid(param, "binary values are only allowed as a body")),
        None if param.required => Err(missing(param)),
        None => Ok(None),
    }
}

fn check_body(param: &ParameterSpec, value: &ArgValue) -> Result<(), ApiError> {
    match (&param.value_type, value) {
        (ValueType::Binary, ArgValue::Binary(_)) => Ok(()),
        (ValueType::Binary, ArgValue::Json(_)) => Err(invalid(param, "expected binary payload")),
        (_, ArgValue::Binary(_)) => Err(invalid(param, "binary payload for a structured body")),
        (_, ArgValue::Json(_)) => Ok(()),
    }
}

fn render_query(
    param: &ParameterSpec,
    value: &Value,
    format: CollectionFormat,
) -> Result<Vec<String>, ApiError> {
    let name = urlencoding::encode(&param.name);
    let items = render_items(param, value)?;
    let pairs = match (value, format) {
        (Value::Array(_), CollectionFormat::Multi) => items
            .iter()
            .map(|item| format!("{name}={}", urlencoding::encode(item)))
            .collect(),
        (Value::Array(_), format) => {
            let delimiter = match format {
                CollectionFormat::Csv | CollectionFormat::Multi => ",",
                CollectionFormat::Ssv => "%20",
                CollectionFormat::Tsv => "%09",
                CollectionFormat::Pipes => "|",
            };
            let joined = items
                .iter()
                .map(|item| urlencoding::encode(item).into_owned())
                .collect::<Vec<_>>()
                .join(delimiter);
            vec![format!("{name}={joined}")]
        }
        _ => items
            .iter()
            .map(|item| format!("{name}={}", urlencoding::encode(item)))
            .collect(),
    };
    Ok(pairs)
}

fn render_joined(param: &ParameterSpec, value: &Value, delimiter: &str) -> Result<String, ApiError> {
    Ok(render_items(param, value)?.join(delimiter))
}

/// Textual form of a scalar, or of each element of an array.
fn render_items(param: &ParameterSpec, value: &Value) -> Result<Vec<String>, ApiError> {
    match (&param.value_type, value) {
        (ValueType::Array(item_type), Value::Array(items)) => items
            .iter()
            .map(|item| render_scalar(param, item_type, item))
            .collect(),
        (ValueType::Array(_), _) => Err(invalid(param, "expected an array")),
        (scalar, value) => Ok(vec![render_scalar(param, scalar, value)?]),
    }
}

fn render_scalar(param: &ParameterSpec, value_type: &ValueType, value: &Value) -> Result<String, ApiError> {
    match (value_type, value) {
        (ValueType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        (ValueType::Integer, _) => Err(invalid(param, "expected an integer")),
        (ValueType::Number, Value::Number(n)) => Ok(n.to_string()),
        (ValueType::Number, _) => Err(invalid(param, "expected a number")),
        (ValueType::Boolean, Value::Bool(b)) => Ok(b.to_string()),
        (ValueType::Boolean, _) => Err(invalid(param, "expected a boolean")),
        (ValueType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s)
            .map(|id| id.to_string())
            .map_err(|e| invalid(param, format!("not a UUID: {e}"))),
        (ValueType::DateTime, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|_| s.clone())
            .map_err(|e| invalid(param, format!("not an RFC 3339 date-time: {e}"))),
        (ValueType::Enum(variants), Value::String(s)) => {
            if variants.iter().any(|v| v == s) {
                Ok(s.clone())
            } else {
                Err(invalid(param, format!("`{s}` is not one of {variants:?}")))
            }
        }
        (ValueType::String, Value::String(s)) => Ok(s.clone()),
        (ValueType::String, Value::Number(n)) => Ok(n.to_string()),
        (ValueType::String, Value::Bool(b)) => Ok(b.to_string()),
        (ValueType::Array(_), _) => Err(invalid(param, "nested arrays are not supported")),
        (ValueType::Object(_) | ValueType::Binary, _) => {
            Err(invalid(param, "structured values cannot be sent in path, query or header"))
        }
        (_, Value::Null) => Err(invalid(param, "null inside a collection")),
        (_, other) => Err(invalid(param, format!("unexpected value {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParameterSpec;
    use crate::http::HttpMethod;
    use serde_json::json;

    fn get_pet() -> OperationDescriptor {
        OperationDescriptor::builder("getPetById", HttpMethod::Get, "/pet/{petId}")
            .param(ParameterSpec::path("petId", ValueType::Integer))
            .build()
            .unwrap()
    }

    fn find_by_status() -> OperationDescriptor {
        OperationDescriptor::builder("findPetsByStatus", HttpMethod::Get, "/pet/findByStatus")
            .param(ParameterSpec::query(
                "status",
                ValueType::array(ValueType::enumeration(["available", "pending", "sold"])),
                true,
            ))
            .param(ParameterSpec::query("limit", ValueType::Integer, false))
            .build()
            .unwrap()
    }

    #[test]
    fn substitutes_path_parameter() {
        let args = Args::new().arg("petId", &7).unwrap();
        let bound = bind(&get_pet(), &args, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/pet/7");
        assert!(bound.headers.is_empty());
        assert!(bound.body.is_none());
    }

    #[test]
    fn percent_encodes_path_values() {
        let op = OperationDescriptor::builder("getUser", HttpMethod::Get, "/user/{username}")
            .param(ParameterSpec::path("username", ValueType::String))
            .build()
            .unwrap();
        let args = Args::new().arg("username", "jo doe/admin").unwrap();
        let bound = bind(&op, &args, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/user/jo%20doe%2Fadmin");
    }

    #[test]
    fn missing_or_null_path_parameter_fails() {
        let err = bind(&get_pet(), &Args::new(), CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { ref name } if name == "petId"));

        let args = Args::new().value("petId", Value::Null);
        let err = bind(&get_pet(), &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { ref name } if name == "petId"));
    }

    #[test]
    fn repeated_key_is_the_default_collection_format() {
        let args = Args::new().arg("status", &["available", "sold"]).unwrap();
        let bound = bind(&find_by_status(), &args, CollectionFormat::Multi).unwrap();
        assert_eq!(
            bound.path_and_query,
            "/pet/findByStatus?status=available&status=sold"
        );
    }

    #[test]
    fn joined_collection_formats() {
        let args = Args::new().arg("status", &["available", "sold"]).unwrap();
        let cases = [
            (CollectionFormat::Csv, "status=available,sold"),
            (CollectionFormat::Ssv, "status=available%20sold"),
            (CollectionFormat::Tsv, "status=available%09sold"),
            (CollectionFormat::Pipes, "status=available|sold"),
        ];
        for (format, expected) in cases {
            let bound = bind(&find_by_status(), &args, format).unwrap();
            assert_eq!(bound.path_and_query, format!("/pet/findByStatus?{expected}"));
        }
    }

    #[test]
    fn parameter_format_overrides_client_default() {
        let op = OperationDescriptor::builder("findByTags", HttpMethod::Get, "/pet/findByTags")
            .param(
                ParameterSpec::query("tags", ValueType::array(ValueType::String), true)
                    .with_collection_format(CollectionFormat::Csv),
            )
            .build()
            .unwrap();
        let args = Args::new().arg("tags", &["a b", "c"]).unwrap();
        let bound = bind(&op, &args, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/pet/findByTags?tags=a%20b,c");
    }

    #[test]
    fn optional_null_query_is_omitted() {
        let args = Args::new()
            .arg("status", &["pending"])
            .unwrap()
            .arg("limit", &None::<i64>)
            .unwrap();
        let bound = bind(&find_by_status(), &args, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/pet/findByStatus?status=pending");
    }

    #[test]
    fn query_follows_declaration_order() {
        let args = Args::new()
            .arg("limit", &10)
            .unwrap()
            .arg("status", &["sold"])
            .unwrap();
        let bound = bind(&find_by_status(), &args, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/pet/findByStatus?status=sold&limit=10");
    }

    #[test]
    fn required_query_missing_fails() {
        let err = bind(&find_by_status(), &Args::new(), CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { ref name } if name == "status"));
    }

    #[test]
    fn enum_values_are_checked() {
        let args = Args::new().arg("status", &["adopted"]).unwrap();
        let err = bind(&find_by_status(), &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { ref name, .. } if name == "status"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let args = Args::new().arg("petId", "seven").unwrap();
        let err = bind(&get_pet(), &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let args = Args::new().arg("petId", &1).unwrap().arg("bogus", &1).unwrap();
        let err = bind(&get_pet(), &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { ref name, .. } if name == "bogus"));
    }

    #[test]
    fn header_parameters_are_collected_and_validated() {
        let op = OperationDescriptor::builder("call123testSpecialTags", HttpMethod::Patch, "/another-fake/dummy")
            .param(ParameterSpec::header("uuid_test", ValueType::Uuid, true))
            .param(ParameterSpec::body("body", ValueType::object("Client"), true))
            .build()
            .unwrap();

        let args = Args::new()
            .arg("uuid_test", "0bc1f3a2-8f1a-4b7e-9c55-5b0b7f1e2a10")
            .unwrap()
            .arg("body", &json!({"client": "x"}))
            .unwrap();
        let bound = bind(&op, &args, CollectionFormat::Multi).unwrap();
        assert_eq!(
            bound.headers.get("uuid_test"),
            Some("0bc1f3a2-8f1a-4b7e-9c55-5b0b7f1e2a10")
        );
        assert_eq!(bound.body, Some(&ArgValue::Json(json!({"client": "x"}))));

        let args = Args::new()
            .arg("uuid_test", "not-a-uuid")
            .unwrap()
            .arg("body", &json!({}))
            .unwrap();
        let err = bind(&op, &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { ref name, .. } if name == "uuid_test"));

        let args = Args::new()
            .arg("uuid_test", "0bc1f3a2-8f1a-4b7e-9c55-5b0b7f1e2a10")
            .unwrap();
        let err = bind(&op, &args, CollectionFormat::Multi).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { ref name } if name == "body"));
    }

    #[test]
    fn date_time_must_be_rfc3339() {
        let op = OperationDescriptor::builder("ordersSince", HttpMethod::Get, "/store/orders")
            .param(ParameterSpec::query("since", ValueType::DateTime, true))
            .build()
            .unwrap();
        let ok = Args::new().arg("since", "2024-05-01T10:00:00Z").unwrap();
        let bound = bind(&op, &ok, CollectionFormat::Multi).unwrap();
        assert_eq!(bound.path_and_query, "/store/orders?since=2024-05-01T10%3A00%3A00Z");

        let bad = Args::new().arg("since", "yesterday").unwrap();
        assert!(bind(&op, &bad, CollectionFormat::Multi).is_err());
    }

    #[test]
    fn binary_body_requires_binary_value() {
        let op = OperationDescriptor::builder("upload", HttpMethod::Post, "/upload")
            .param(ParameterSpec::body("file", ValueType::Binary, true))
            .build()
            .unwrap();
        let args = Args::new().binary("file", vec![0u8, 159, 146, 150]);
        let bound = bind(&op, &args, CollectionFormat::Multi).unwrap();
        assert!(matches!(bound.body, Some(ArgValue::Binary(b)) if b.len() == 4));

        let args = Args::new().arg("file", "text").unwrap();
        assert!(bind(&op, &args, CollectionFormat::Multi).is_err());
    }

    #[test]
    fn header_values_with_control_characters_are_rejected() {
        let op = OperationDescriptor::builder("deletePet", HttpMethod::Delete, "/pet/{petId}")
            .param(ParameterSpec::path("petId", ValueType::Integer))
            .param(ParameterSpec::header("api_key", ValueType::String, false))
            .build()
            .unwrap();
        let args = Args::new()
            .arg("petId", &1)
            .unwrap()
            .arg("api_key", "bad\nvalue")
            .unwrap();
        assert!(matches!(
            bind(&op, &args, CollectionFormat::Multi),
            Err(ApiError::InvalidArgument { ref name, .. }) if name == "api_key"
        ));
    }

    #[test]
    fn non_finite_numbers_are_invalid_not_missing() {
        for value in [f64::NAN, f64::INFINITY] {
            let err = Args::new().arg("limit", &value).unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument { ref name, .. } if name == "limit"));
        }
        let err = Args::new()
            .arg("weights", &json!({"a": 1.5}))
            .and_then(|args| args.arg("nested", &vec![Some(1.0), Some(f64::NEG_INFINITY)]))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { ref name, .. } if name == "nested"));
        assert!(Args::new().arg("limit", &2.5).is_ok());
    }

    #[test]
    fn objects_cannot_go_in_the_query() {
        let op = OperationDescriptor::builder("search", HttpMethod::Get, "/search")
            .param(ParameterSpec::query("filter", ValueType::object("Filter"), false))
            .build()
            .unwrap();
        let args = Args::new().arg("filter", &json!({"a": 1})).unwrap();
        assert!(matches!(
            bind(&op, &args, CollectionFormat::Multi),
            Err(ApiError::InvalidArgument { .. })
        ));
    }
}
