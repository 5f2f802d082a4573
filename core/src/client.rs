//! Client factory and the generic operation call path.
//!
//! # Design
//! `ClientFactory::build` validates a descriptor table against a
//! `ClientConfig` once; the resulting `Client` is immutable, cheap to clone
//! and safe to call from many tasks at once. Every operation goes through
//! the same path: bind arguments, encode the body, execute, decode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::binder::{bind, ArgValue, Args};
use crate::codec::decode_value;
use crate::config::ClientConfig;
use crate::descriptor::{OperationDescriptor, ValueType};
use crate::error::{ApiError, ConfigError, DecodeError};
use crate::executor::Executor;
use crate::http::{Headers, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};

/// A decoded 2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: Headers,
    pub data: T,
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Replaces the config timeout for this call.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Descriptors indexed by name, shared between reconfigured clients.
#[derive(Debug)]
struct OperationTable {
    operations: Vec<OperationDescriptor>,
    by_name: HashMap<String, usize>,
}

impl OperationTable {
    fn new(descriptors: impl IntoIterator<Item = OperationDescriptor>) -> Result<Self, ConfigError> {
        let mut operations = Vec::new();
        let mut by_name = HashMap::new();
        for op in descriptors {
            if by_name.contains_key(op.name()) {
                return Err(ConfigError::DuplicateOperation {
                    name: op.name().to_string(),
                });
            }
            by_name.insert(op.name().to_string(), operations.len());
            operations.push(op);
        }
        Ok(Self {
            operations,
            by_name,
        })
    }

    fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.by_name.get(name).map(|&i| &self.operations[i])
    }
}

pub struct ClientFactory;

impl ClientFactory {
    /// Build a client exposing one operation per descriptor.
    pub fn build(
        descriptors: impl IntoIterator<Item = OperationDescriptor>,
        config: ClientConfig,
    ) -> Result<Client, ConfigError> {
        let table = Arc::new(OperationTable::new(descriptors)?);
        Client::assemble(table, config)
    }
}

#[derive(Debug)]
struct Inner {
    config: ClientConfig,
    table: Arc<OperationTable>,
    executor: Executor,
}

#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    fn assemble(table: Arc<OperationTable>, config: ClientConfig) -> Result<Self, ConfigError> {
        for op in &table.operations {
            check_codecs(op, &config)?;
        }

        let transport: Arc<dyn Transport> = match config.transport() {
            Some(transport) => transport.clone(),
            None => Arc::new(
                ReqwestTransport::new(config.redirect()).map_err(|e| ConfigError::Transport(Box::new(e)))?,
            ),
        };
        let executor = Executor::new(transport, config.interceptors().to_vec());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                table,
                executor,
            }),
        })
    }

    /// A new client over the same operations with a different config.
    pub fn reconfigure(&self, config: ClientConfig) -> Result<Client, ConfigError> {
        Self::assemble(self.inner.table.clone(), config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.inner.table.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.inner.table.operations.iter()
    }

    pub async fn invoke<T: DeserializeOwned>(&self, operation: &str, args: Args) -> ApiResult<T> {
        self.invoke_with(operation, args, CallOptions::default()).await
    }

    /// Call `operation` and decode the 2xx body into `T`.
    ///
    /// Operations without a declared response type decode from `null`, so
    /// `T = ()` fits them. Binary responses decode as a byte array.
    pub async fn invoke_with<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: Args,
        options: CallOptions,
    ) -> ApiResult<T> {
        let op = self.lookup(operation)?;
        let span = debug_span!("invoke", operation = op.name(), method = %op.method());
        self.call(op, &args, &options).instrument(span).await
    }

    /// Call `operation` and return the 2xx body untouched.
    pub async fn invoke_raw(&self, operation: &str, args: Args, options: CallOptions) -> ApiResult<Bytes> {
        let op = self.lookup(operation)?;
        let span = debug_span!("invoke", operation = op.name(), method = %op.method());
        let response = self.send(op, &args, &options).instrument(span).await?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            data: response.body,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        op: &OperationDescriptor,
        args: &Args,
        options: &CallOptions,
    ) -> ApiResult<T> {
        let response = self.send(op, args, options).await?;
        let data = self.decode(op, &response).map_err(|source| {
            debug!(path = %source.path, "response did not match declared type");
            ApiError::ResponseDecode {
                status: response.status,
                body: response.body.clone(),
                source,
            }
        })?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            data,
        })
    }

    fn lookup(&self, operation: &str) -> Result<&OperationDescriptor, ApiError> {
        self.inner
            .table
            .get(operation)
            .ok_or_else(|| ApiError::UnknownOperation {
                name: operation.to_string(),
            })
    }

    async fn send(
        &self,
        op: &OperationDescriptor,
        args: &Args,
        options: &CallOptions,
    ) -> Result<HttpResponse, ApiError> {
        let config = &self.inner.config;
        let bound = bind(op, args, config.collection_format())?;

        let mut headers = config.default_headers().clone();
        headers.merge(&bound.headers);

        let body = match bound.body {
            Some(ArgValue::Binary(bytes)) => {
                headers.insert("content-type", op.consumes());
                Some(bytes.clone())
            }
            Some(ArgValue::Json(value)) => {
                let codec = config.codecs().get(op.consumes()).ok_or_else(|| ApiError::InvalidArgument {
                    name: op.body_parameter().map(|p| p.name.clone()).unwrap_or_default(),
                    reason: format!("no codec for `{}`", op.consumes()),
                })?;
                headers.insert("content-type", op.consumes());
                Some(codec.encode(value)?)
            }
            None => None,
        };
        if op.response_type().is_some() && !headers.contains("accept") {
            headers.insert("accept", op.produces());
        }

        let request = HttpRequest {
            method: op.method(),
            url: format!("{}{}", config.base_url(), bound.path_and_query),
            headers,
            body,
        };
        let timeout = options.timeout.unwrap_or(config.timeout());
        self.inner
            .executor
            .execute(op.name(), request, timeout, options.cancel.as_ref())
            .await
    }

    fn decode<T: DeserializeOwned>(&self, op: &OperationDescriptor, response: &HttpResponse) -> Result<T, DecodeError> {
        let value = match op.response_type() {
            None => Value::Null,
            Some(ValueType::Binary) => Value::Array(response.body.iter().map(|&b| Value::from(b)).collect()),
            Some(_) => {
                let codec = self
                    .inner
                    .config
                    .codecs()
                    .get(op.produces())
                    .ok_or_else(|| DecodeError::at_root(format!("no codec for `{}`", op.produces())))?;
                codec.decode(&response.body)?
            }
        };
        decode_value(value)
    }
}

fn check_codecs(op: &OperationDescriptor, config: &ClientConfig) -> Result<(), ConfigError> {
    let needs = |value_type: Option<&ValueType>| value_type.is_some_and(|t| !t.is_binary());
    let required = [
        (needs(op.body_type()), op.consumes()),
        (needs(op.response_type()), op.produces()),
    ];
    for (needed, content_type) in required {
        if needed && !config.codecs().contains(content_type) {
            return Err(ConfigError::UnregisteredCodec {
                operation: op.name().to_string(),
                content_type: content_type.to_string(),
            });
        }
    }
    Ok(())
}
