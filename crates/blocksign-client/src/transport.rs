//! Transport seam
//!
//! The client builds requests; something else puts them on the wire.
//! Implement [`Transport`] over your HTTP stack of choice. [`MockTransport`]
//! answers from canned bodies and records what was sent, for tests and
//! dry runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("No mock response registered for {0}")]
    NoMockResponse(String),
}

/// Form parameters, kept in insertion order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

/// Parameter names whose values never appear in `Debug` output
const SENSITIVE_PARAMS: &[&str] = &["pin", "private_key", "api_key"];

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name`, replacing any earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            if SENSITIVE_PARAMS.contains(&name) {
                map.entry(&name, &"<redacted>");
            } else {
                map.entry(&name, &value);
            }
        }
        map.finish()
    }
}

/// A fully built API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Remote method name, e.g. `withdraw`
    pub method: String,
    /// Endpoint URL without the API key
    pub url: String,
    /// API key, sent as the `api_key` query parameter
    pub api_key: String,
    pub params: Params,
}

impl ApiRequest {
    /// URL including the `api_key` query parameter.
    pub fn url_with_key(&self) -> String {
        format!("{}?api_key={}", self.url, self.api_key)
    }
}

/// Sends a request and returns the raw response body.
pub trait Transport {
    fn post(&self, request: &ApiRequest) -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, request: &ApiRequest) -> Result<String, TransportError> {
        (**self).post(request)
    }
}

/// Canned responses keyed by method name.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: HashMap<String, String>,
    sent: RefCell<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `method` with `body`.
    pub fn mock(&mut self, method: impl Into<String>, body: impl Into<String>) {
        self.responses.insert(method.into(), body.into());
    }

    pub fn with_response(mut self, method: impl Into<String>, body: impl Into<String>) -> Self {
        self.mock(method, body);
        self
    }

    /// Requests seen so far, oldest first.
    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.borrow().clone()
    }

    /// Requests seen for one method.
    pub fn sent_to(&self, method: &str) -> Vec<ApiRequest> {
        self.sent
            .borrow()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

impl Transport for MockTransport {
    fn post(&self, request: &ApiRequest) -> Result<String, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        self.responses
            .get(&request.method)
            .cloned()
            .ok_or_else(|| TransportError::NoMockResponse(request.method.clone()))
    }
}
