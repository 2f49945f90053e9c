//! HTTP backends for the validator.
//!
//! The validator only needs a single blocking `GET` that never follows
//! redirects on its own. [`agent::UreqBackend`] does that over the network;
//! [`MockBackend`] scripts responses in memory.
//!
//! # Testing
//!
//! ```
//! use netprobe::backend::{HttpBackend, HttpResponse, MockBackend};
//!
//! let mock = MockBackend::new();
//! mock.respond("http://172.20.0.3/", HttpResponse::ok("<link href='/wp-content/x.css'>"));
//!
//! let response = mock.get("http://172.20.0.3/").unwrap();
//! assert_eq!(response.status, 200);
//! assert!(mock.get("http://wordpress/").is_err());
//! assert_eq!(mock.requests().len(), 2);
//! ```

pub mod agent;

use crate::error::{ProbeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// `Location` header, if present
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            location: Some(location.into()),
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 3xx with a `Location` to follow.
    pub fn redirect_location(&self) -> Option<&str> {
        if (300..400).contains(&self.status) {
            self.location.as_deref()
        } else {
            None
        }
    }
}

/// Backend trait for issuing probe requests.
pub trait HttpBackend: Send + Sync {
    /// Issue one `GET` to an absolute URL.
    ///
    /// Must not follow redirects and must return non-2xx responses as
    /// responses, not errors.
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

impl<B: HttpBackend + ?Sized> HttpBackend for Box<B> {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url)
    }
}

impl<B: HttpBackend + ?Sized> HttpBackend for &B {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url)
    }
}

/// Mock backend for testing without network access.
///
/// URLs are compared after parsing, so `http://host` and `http://host/`
/// are the same key. Unscripted URLs fail with a connection error.
/// Clones share state, so a test can keep a handle after moving one into
/// a validator.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<HashMap<String, Result<HttpResponse>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with `response`.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        lock(&self.responses).insert(key(url), Ok(response));
    }

    /// Fail requests to `url` with `error`.
    pub fn fail(&self, url: &str, error: ProbeError) {
        lock(&self.responses).insert(key(url), Err(error));
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    /// How many times `url` was requested.
    pub fn request_count(&self, url: &str) -> usize {
        let wanted = key(url);
        lock(&self.requests).iter().filter(|u| **u == wanted).count()
    }
}

impl HttpBackend for MockBackend {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let url = key(url);
        lock(&self.requests).push(url.clone());
        lock(&self.responses)
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Connection(format!("connection refused: {url}"))))
    }
}

fn key(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_string(), String::from)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
