//! Static metadata describing one API operation.
//!
//! # Design
//! A descriptor replaces the annotated interface method of a generated
//! client: verb, path template, parameter roles and payload shapes are plain
//! data interpreted by one generic execution path. Descriptors are validated
//! once in `OperationDescriptorBuilder::build` and are immutable afterwards.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::http::HttpMethod;

pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Path,
    Query,
    Header,
    Body,
}

/// Semantic type of a parameter or payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    Number,
    Boolean,
    Uuid,
    /// RFC 3339 date-time.
    DateTime,
    /// One of the listed wire names.
    Enum(Vec<String>),
    /// A named schema, carried as a structured payload.
    Object(String),
    Array(Box<ValueType>),
    /// Raw bytes, never passed through a codec.
    Binary,
}

impl ValueType {
    pub fn object(schema: impl Into<String>) -> Self {
        ValueType::Object(schema.into())
    }

    pub fn array(item: ValueType) -> Self {
        ValueType::Array(Box::new(item))
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValueType::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ValueType::Binary)
    }
}

/// How array-valued parameters are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    /// `name=a&name=b`
    #[default]
    Multi,
    /// `name=a,b`
    Csv,
    /// `name=a%20b`
    Ssv,
    /// `name=a%09b`
    Tsv,
    /// `name=a|b`
    Pipes,
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub value_type: ValueType,
    pub required: bool,
    /// Overrides the client-wide format for array values.
    pub collection_format: Option<CollectionFormat>,
}

impl ParameterSpec {
    /// Path parameters are always required.
    pub fn path(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, ParamKind::Path, value_type, true)
    }

    pub fn query(name: impl Into<String>, value_type: ValueType, required: bool) -> Self {
        Self::new(name, ParamKind::Query, value_type, required)
    }

    pub fn header(name: impl Into<String>, value_type: ValueType, required: bool) -> Self {
        Self::new(name, ParamKind::Header, value_type, required)
    }

    pub fn body(name: impl Into<String>, value_type: ValueType, required: bool) -> Self {
        Self::new(name, ParamKind::Body, value_type, required)
    }

    pub fn with_collection_format(mut self, format: CollectionFormat) -> Self {
        self.collection_format = Some(format);
        self
    }

    fn new(name: impl Into<String>, kind: ParamKind, value_type: ValueType, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type,
            required,
            collection_format: None,
        }
    }
}

/// Immutable metadata for one operation. Build with
/// [`OperationDescriptor::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    name: String,
    method: HttpMethod,
    path_template: String,
    parameters: Vec<ParameterSpec>,
    consumes: String,
    produces: String,
    response_type: Option<ValueType>,
}

impl OperationDescriptor {
    pub fn builder(
        name: impl Into<String>,
        method: HttpMethod,
        path_template: impl Into<String>,
    ) -> OperationDescriptorBuilder {
        OperationDescriptorBuilder {
            name: name.into(),
            method,
            path_template: path_template.into(),
            parameters: Vec::new(),
            consumes: APPLICATION_JSON.to_string(),
            produces: APPLICATION_JSON.to_string(),
            response_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameters_of(&self, kind: ParamKind) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(move |p| p.kind == kind)
    }

    pub fn body_parameter(&self) -> Option<&ParameterSpec> {
        self.parameters_of(ParamKind::Body).next()
    }

    pub fn body_type(&self) -> Option<&ValueType> {
        self.body_parameter().map(|p| &p.value_type)
    }

    /// Content type of the request body.
    pub fn consumes(&self) -> &str {
        &self.consumes
    }

    /// Content type of the response body.
    pub fn produces(&self) -> &str {
        &self.produces
    }

    pub fn response_type(&self) -> Option<&ValueType> {
        self.response_type.as_ref()
    }
}

/// Collects descriptor fields and validates them in `build`.
#[derive(Debug, Clone)]
pub struct OperationDescriptorBuilder {
    name: String,
    method: HttpMethod,
    path_template: String,
    parameters: Vec<ParameterSpec>,
    consumes: String,
    produces: String,
    response_type: Option<ValueType>,
}

impl OperationDescriptorBuilder {
    pub fn param(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = content_type.into();
        self
    }

    pub fn produces(mut self, content_type: impl Into<String>) -> Self {
        self.produces = content_type.into();
        self
    }

    pub fn responds_with(mut self, value_type: ValueType) -> Self {
        self.response_type = Some(value_type);
        self
    }

    pub fn build(self) -> Result<OperationDescriptor, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyOperationName);
        }

        let placeholders = placeholders(&self.path_template).ok_or_else(|| {
            ConfigError::MalformedTemplate {
                operation: self.name.clone(),
                template: self.path_template.clone(),
            }
        })?;

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert((param.kind, param.name.as_str())) {
                return Err(ConfigError::DuplicateParameter {
                    operation: self.name.clone(),
                    name: param.name.clone(),
                });
            }
        }

        if self
            .parameters
            .iter()
            .filter(|p| p.kind == ParamKind::Body)
            .count()
            > 1
        {
            return Err(ConfigError::MultipleBodies {
                operation: self.name.clone(),
            });
        }

        for param in self.parameters.iter().filter(|p| p.kind == ParamKind::Path) {
            if !placeholders.contains(&param.name.as_str()) {
                return Err(ConfigError::UnboundPathParameter {
                    operation: self.name.clone(),
                    name: param.name.clone(),
                });
            }
        }

        for placeholder in &placeholders {
            let bound = self
                .parameters
                .iter()
                .any(|p| p.kind == ParamKind::Path && p.name == *placeholder);
            if !bound {
                return Err(ConfigError::UnmatchedPlaceholder {
                    operation: self.name.clone(),
                    name: placeholder.to_string(),
                });
            }
        }

        Ok(OperationDescriptor {
            name: self.name,
            method: self.method,
            path_template: self.path_template,
            parameters: self.parameters,
            consumes: self.consumes,
            produces: self.produces,
            response_type: self.response_type,
        })
    }
}

/// Names between `{` and `}` in `template`, or `None` when braces are
/// unbalanced, nested or empty.
pub(crate) fn placeholders(template: &str) -> Option<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return None;
        }
        let after = &rest[open + 1..];
        let close = after.find(['{', '}'])?;
        if after.as_bytes()[close] == b'{' || close == 0 {
            return None;
        }
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    Some(names)
}
