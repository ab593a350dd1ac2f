//! Blocking HTTP calls over libcurl, shaped as retriable operations.
//!
//! Status codes are returned as-is; deciding whether a 429 or 503 is worth
//! another attempt is the retry classifier's job. Curl failures are mapped
//! with [`classify_curl_error`] so connection-level problems are retried and
//! everything else is not.

use crate::config::HcxConfig;
use crate::progress::{ProgressWriter, TransferProgressCallback};
use crate::response::{HttpResponse, Response};
use crate::retry::{classify_curl_error, CallError};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::str;
use std::sync::Arc;
use std::time::Duration;

/// HTTP method for requests that carry a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

/// Curl-backed transport. Each call builds a fresh easy handle, so one
/// transport can be shared by concurrent retriables.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    user_agent: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::from_config(&HcxConfig::default())
    }
}

impl CurlTransport {
    pub fn from_config(cfg: &HcxConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    fn easy(&self, url: &str) -> Result<curl::easy::Easy, CallError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(classify_curl_error)?;
        easy.follow_location(true).map_err(classify_curl_error)?;
        easy.useragent(&self.user_agent).map_err(classify_curl_error)?;
        easy.connect_timeout(self.connect_timeout)
            .map_err(classify_curl_error)?;
        easy.timeout(self.timeout).map_err(classify_curl_error)?;
        Ok(easy)
    }

    /// GET `url`, buffering the body.
    pub fn get(&self, url: &str) -> Result<HttpResponse, CallError> {
        let mut easy = self.easy(url)?;
        let mut headers: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        headers.push(line.to_string());
                    }
                    true
                })
                .map_err(classify_curl_error)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(classify_curl_error)?;
            transfer.perform().map_err(classify_curl_error)?;
        }
        let response = build_response(&mut easy, &headers, body)?;
        tracing::debug!(url, status = response.status, bytes = response.body.len(), "GET finished");
        Ok(response)
    }

    /// GET `url`, streaming a successful body into `sink` as it arrives.
    ///
    /// When the response announces a `Content-Length`, the sink is wrapped in
    /// a [`ProgressWriter`] reporting to `callback`; without one the body is
    /// written untracked. Unsuccessful responses never touch the sink: their
    /// body is buffered into the returned response instead, so a retried
    /// download does not mix error pages into the payload. On success the
    /// returned response has an empty body.
    pub fn get_to<W: Write>(
        &self,
        url: &str,
        sink: W,
        callback: Option<Arc<dyn TransferProgressCallback>>,
    ) -> Result<HttpResponse, CallError> {
        let mut easy = self.easy(url)?;
        let head = RefCell::new(HttpResponse::new(0));
        let mut headers: Vec<String> = Vec::new();
        let mut error_body: Vec<u8> = Vec::new();
        let mut stream = StreamSink::new(sink, callback);
        let mut write_error: Option<io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        head.borrow_mut().push_raw_header(line);
                        headers.push(line.to_string());
                    }
                    true
                })
                .map_err(classify_curl_error)?;
            transfer
                .write_function(|data| {
                    let (success, length) = {
                        let head = head.borrow();
                        (head.is_success(), head.content_length())
                    };
                    if !success {
                        error_body.extend_from_slice(data);
                        return Ok(data.len());
                    }
                    match stream.write_all(data, length) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            write_error = Some(e);
                            // A short count makes curl abort the transfer.
                            Ok(0)
                        }
                    }
                })
                .map_err(classify_curl_error)?;
            transfer.perform()
        };
        if let Err(e) = performed {
            if let Some(io_err) = write_error.take() {
                return Err(CallError::Io(io_err));
            }
            return Err(classify_curl_error(e));
        }
        stream.flush()?;
        let response = build_response(&mut easy, &headers, error_body)?;
        tracing::debug!(
            url,
            status = response.status,
            streamed = stream.written(),
            tracked = stream.is_tracked(),
            "streamed GET finished"
        );
        Ok(response)
    }

    /// Send `body` (exactly `content_length` bytes) with the given method.
    pub fn send<R: Read>(
        &self,
        method: Method,
        url: &str,
        content_type: &str,
        content_length: u64,
        mut body: R,
    ) -> Result<HttpResponse, CallError> {
        let mut easy = self.easy(url)?;
        match method {
            Method::Put => {
                easy.upload(true).map_err(classify_curl_error)?;
                easy.in_filesize(content_length).map_err(classify_curl_error)?;
            }
            Method::Post => {
                easy.post(true).map_err(classify_curl_error)?;
                easy.post_field_size(content_length)
                    .map_err(classify_curl_error)?;
            }
        }
        let mut list = curl::easy::List::new();
        list.append(&format!("Content-Type: {}", content_type))
            .map_err(classify_curl_error)?;
        // Stops curl from waiting on "Expect: 100-continue" for large bodies.
        list.append("Expect:").map_err(classify_curl_error)?;
        easy.http_headers(list).map_err(classify_curl_error)?;

        let mut headers: Vec<String> = Vec::new();
        let mut received: Vec<u8> = Vec::new();
        let mut read_error: Option<std::io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .read_function(|into| match body.read(into) {
                    Ok(n) => Ok(n),
                    Err(e) => {
                        read_error = Some(e);
                        Err(curl::easy::ReadError::Abort)
                    }
                })
                .map_err(classify_curl_error)?;
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        headers.push(line.to_string());
                    }
                    true
                })
                .map_err(classify_curl_error)?;
            transfer
                .write_function(|data| {
                    received.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(classify_curl_error)?;
            transfer.perform()
        };
        if let Err(e) = performed {
            // The body reader failed; report that instead of curl's abort code.
            if let Some(io_err) = read_error.take() {
                return Err(CallError::Io(io_err));
            }
            return Err(classify_curl_error(e));
        }
        let response = build_response(&mut easy, &headers, received)?;
        tracing::debug!(
            url,
            method = method.as_str(),
            status = response.status,
            sent = content_length,
            "upload finished"
        );
        Ok(response)
    }
}

fn build_response(
    easy: &mut curl::easy::Easy,
    headers: &[String],
    body: Vec<u8>,
) -> Result<HttpResponse, CallError> {
    let code = easy.response_code().map_err(classify_curl_error)?;
    let status =
        u16::try_from(code).map_err(|_| CallError::other(format!("invalid HTTP status {}", code)))?;
    let mut response = HttpResponse::new(status).with_body(body);
    for line in headers {
        response.push_raw_header(line);
    }
    Ok(response)
}

/// Download sink that decides on the first chunk whether to track progress.
struct StreamSink<W: Write> {
    plain: Option<W>,
    tracked: Option<ProgressWriter<W>>,
    callback: Option<Arc<dyn TransferProgressCallback>>,
    written: u64,
}

impl<W: Write> StreamSink<W> {
    fn new(sink: W, callback: Option<Arc<dyn TransferProgressCallback>>) -> Self {
        Self {
            plain: Some(sink),
            tracked: None,
            callback,
            written: 0,
        }
    }

    fn write_all(&mut self, data: &[u8], content_length: Option<u64>) -> io::Result<()> {
        if let Some(callback) = self.callback.take() {
            if let Some(total) = content_length.filter(|&n| n > 0) {
                if let Some(inner) = self.plain.take() {
                    let writer = ProgressWriter::new(inner, callback, total)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                    self.tracked = Some(writer);
                }
            }
        }
        match (&mut self.tracked, &mut self.plain) {
            (Some(w), _) => w.write_all(data)?,
            (None, Some(w)) => w.write_all(data)?,
            (None, None) => return Ok(()),
        }
        self.written += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match (&mut self.tracked, &mut self.plain) {
            (Some(w), _) => w.flush(),
            (None, Some(w)) => w.flush(),
            (None, None) => Ok(()),
        }
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn is_tracked(&self) -> bool {
        self.tracked.is_some()
    }
}
