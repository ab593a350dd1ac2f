//! Response abstraction consumed by the retry classifier.
//!
//! The engine only needs a status code, header lookup and a success
//! predicate; `HttpResponse` is the concrete type the curl transport builds.

/// What the classifier needs to know about a completed HTTP call.
pub trait Response {
    /// Numeric HTTP status code.
    fn status(&self) -> u16;

    /// First value of the named header, if present.
    fn header(&self, name: &str) -> Option<&str>;

    /// True for 2xx responses.
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

/// Buffered HTTP response: status line, headers in arrival order, and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// `Content-Length` as sent by the server (not the buffered body length).
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Parse one raw header line (as delivered by curl's header callback).
    /// A status line sets the status and resets previously collected headers,
    /// so only the headers of the final response survive redirects.
    pub(crate) fn push_raw_header(&mut self, line: &str) {
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            self.headers.clear();
            if let Some(status) = line.split_whitespace().nth(1).and_then(|c| c.parse().ok()) {
                self.status = status;
            }
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            self.headers
                .push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

impl Response for HttpResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
