//! Init data location.
//!
//! The Mini App frontend and the various Telegram clients deliver the signed
//! init data in different places. [`locate_init_data`] walks
//! [`INIT_DATA_SOURCES`] in order and returns the first non-empty value
//! together with a [`Provenance`] tag recording where it was found.

use axum::http::HeaderMap;
use serde_json::Value;
use std::fmt;

/// Headers that may carry init data, in precedence order.
pub const INIT_DATA_HEADERS: [&str; 4] = [
    "telegram-init-data",
    "x-telegram-web-app-data",
    "x-init-data",
    "x-telegram-initdata",
];

/// Where a raw token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// JSON body field (`initData` or `init_data`).
    Body(&'static str),
    /// Request header.
    Header(&'static str),
    /// Query parameter.
    Query(&'static str),
}

impl Provenance {
    /// Bounded label for metrics (`body`, `header`, `query`).
    pub fn kind(&self) -> &'static str {
        match self {
            Provenance::Body(_) => "body",
            Provenance::Header(_) => "header",
            Provenance::Query(_) => "query",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Body(field) => write!(f, "body:{}", field),
            Provenance::Header(name) => write!(f, "header:{}", name),
            Provenance::Query(name) => write!(f, "query:{}", name),
        }
    }
}

/// Raw, unverified init data plus where it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken {
    value: String,
    provenance: Provenance,
}

impl RawToken {
    pub fn new(value: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            value: value.into(),
            provenance,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// Custom Debug implementation that keeps the token itself out of logs.
impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawToken")
            .field("value", &"[REDACTED]")
            .field("len", &self.value.len())
            .field("provenance", &self.provenance)
            .finish()
    }
}

/// The parts of a request the gate inspects.
///
/// Built once per request by the capture middleware, which reads the body at
/// most once, and shared with every later stage through request extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestSources {
    headers: HeaderMap,
    body: Option<Value>,
    query: Vec<(String, String)>,
}

impl RequestSources {
    pub fn new(headers: HeaderMap, body: Option<Value>, query: Vec<(String, String)>) -> Self {
        Self {
            headers,
            body,
            query,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Header value as UTF-8, `None` when absent or not valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First occurrence of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// String field of a JSON object body.
    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.body.as_ref()?.get(name)?.as_str()
    }

    /// Whether any recognized init data header carries a non-empty value.
    pub fn has_init_data_header(&self) -> bool {
        INIT_DATA_HEADERS
            .iter()
            .any(|name| self.header(name).and_then(non_empty).is_some())
    }
}

/// One place init data may be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitDataSource {
    BodyField(&'static str),
    Header(&'static str),
    QueryParam(&'static str),
}

impl InitDataSource {
    fn extract(self, sources: &RequestSources) -> Option<RawToken> {
        let (value, provenance) = match self {
            InitDataSource::BodyField(field) => (sources.body_field(field), Provenance::Body(field)),
            InitDataSource::Header(name) => (sources.header(name), Provenance::Header(name)),
            InitDataSource::QueryParam(name) => {
                (sources.query_param(name), Provenance::Query(name))
            }
        };

        value
            .and_then(non_empty)
            .map(|value| RawToken::new(value, provenance))
    }
}

/// Extraction strategies, evaluated in order; the first hit wins.
pub const INIT_DATA_SOURCES: [InitDataSource; 8] = [
    InitDataSource::BodyField("initData"),
    InitDataSource::BodyField("init_data"),
    InitDataSource::Header(INIT_DATA_HEADERS[0]),
    InitDataSource::Header(INIT_DATA_HEADERS[1]),
    InitDataSource::Header(INIT_DATA_HEADERS[2]),
    InitDataSource::Header(INIT_DATA_HEADERS[3]),
    InitDataSource::QueryParam("tgWebAppData"),
    InitDataSource::QueryParam("init_data"),
];

/// Find the raw init data for a request.
///
/// Empty and whitespace-only values are treated as absent and the scan
/// continues with the next source.
pub fn locate_init_data(sources: &RequestSources) -> Option<RawToken> {
    INIT_DATA_SOURCES
        .iter()
        .find_map(|source| source.extract(sources))
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
