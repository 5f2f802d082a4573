//! Client configuration.
//!
//! # Design
//! `ClientConfig` is built once through `ClientConfigBuilder` and never
//! mutated; a `Client` that needs different settings is rebuilt with
//! `Client::reconfigure`. Because nothing inside changes after `build`,
//! concurrent calls read it without locking.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{Codec, CodecRegistry};
use crate::descriptor::CollectionFormat;
use crate::error::ConfigError;
use crate::executor::Interceptor;
use crate::http::Headers;
use crate::transport::{RedirectPolicy, Transport};

/// Timeout applied when a call does not pass its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    default_headers: Headers,
    interceptors: Vec<Arc<dyn Interceptor>>,
    timeout: Duration,
    redirect: RedirectPolicy,
    collection_format: CollectionFormat,
    codecs: CodecRegistry,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientConfig {
    pub fn builder(base_url: &str) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                default_headers: Headers::new(),
                interceptors: Vec::new(),
                timeout: DEFAULT_TIMEOUT,
                redirect: RedirectPolicy::default(),
                collection_format: CollectionFormat::default(),
                codecs: CodecRegistry::default(),
                transport: None,
            },
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn redirect(&self) -> RedirectPolicy {
        self.redirect
    }

    pub fn collection_format(&self) -> CollectionFormat {
        self.collection_format
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Injected transport; `None` means the client builds a `ReqwestTransport`.
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("interceptors", &self.interceptors.len())
            .field("timeout", &self.timeout)
            .field("redirect", &self.redirect)
            .field("collection_format", &self.collection_format)
            .field("codecs", &self.codecs)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(name, value);
        self
    }

    /// Append an interceptor; interceptors run in the order added.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.config.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.config.redirect = redirect;
        self
    }

    pub fn collection_format(mut self, format: CollectionFormat) -> Self {
        self.config.collection_format = format;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.config.codecs.register(codec);
        self
    }

    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.config.codecs = codecs;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let url = &self.config.base_url;
        let has_host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(ConfigError::InvalidBaseUrl { url: url.clone() });
        }
        if let Some((name, reason)) = self.config.default_headers.first_invalid() {
            return Err(ConfigError::InvalidHeader {
                name: name.to_string(),
                reason,
            });
        }
        Ok(self.config)
    }
}
