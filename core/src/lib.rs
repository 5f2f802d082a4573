//! Declarative REST operation binder, with generated petstore bindings.
//!
//! # Overview
//! A table of `OperationDescriptor`s (verb, path template, parameter roles,
//! payload types) is turned into a `Client` by `ClientFactory`. Every call
//! takes the same path: the binder resolves URL and headers, a codec
//! encodes the body, the executor runs the request through an injected
//! `Transport`, and the codec decodes the 2xx body into the caller's type.
//!
//! # Design
//! - Descriptors replace per-interface proxies: one generic call path
//!   interprets plain data.
//! - `ClientConfig` is immutable; `Client::reconfigure` builds a new client.
//! - The transport is a narrow trait so tests swap in fakes; the default is
//!   `ReqwestTransport` with a shared connection pool.
//! - Failures are typed: configuration problems surface at build time,
//!   status errors and decode errors stay distinct at call time.

pub mod binder;
pub mod client;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod http;
pub mod petstore;
pub mod transport;
pub mod types;

pub use binder::{ArgValue, Args};
pub use client::{ApiResponse, ApiResult, CallOptions, Client, ClientFactory};
pub use codec::{Codec, CodecRegistry, FormCodec, JsonCodec, TextCodec};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_TIMEOUT};
pub use descriptor::{CollectionFormat, OperationDescriptor, ParamKind, ParameterSpec, ValueType};
pub use error::{ApiError, ConfigError, DecodeError, EncodeError, TransportError};
pub use executor::{Interceptor, RequestView};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{RedirectPolicy, ReqwestTransport, Transport};

pub use tokio_util::sync::CancellationToken;
