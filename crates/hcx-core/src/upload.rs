//! File upload bodies with progress reporting.
//!
//! An `UploadBody` is built from a file and `UploadOptions`, validated up
//! front, and can then be streamed either push-style (`write_to`) or
//! pull-style (`reader`). Progress always counts file bytes against the file
//! size; multipart framing bytes are not reported.

use crate::progress::{
    format_prefix, LogProgressCallback, ProgressReader, ProgressWriter, TransferProgressCallback,
    TransferType,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Form field used for multipart uploads when none is given.
pub const DEFAULT_FIELD_NAME: &str = "upload";

const BOUNDARY_LEN: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("file is empty: {}", .0.display())]
    Empty(PathBuf),
    #[error("file is not readable: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("multipart field name must not be blank")]
    BlankFieldName,
    #[error("destination must not be blank when no progress callback is given")]
    BlankDestination,
}

/// Options for building an upload body.
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// MIME type of the file. Blank or `None` sniffs it from the file extension.
    pub content_type: Option<String>,
    /// Name of the receiving service, used in the default log prefix.
    pub destination: String,
    /// Progress observer. `None` logs progress through `tracing`.
    pub callback: Option<Arc<dyn TransferProgressCallback>>,
    /// Multipart form field. `None` uses [`DEFAULT_FIELD_NAME`]; ignored for raw bodies.
    pub field_name: Option<String>,
}

impl UploadOptions {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn callback(mut self, callback: Arc<dyn TransferProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("content_type", &self.content_type)
            .field("destination", &self.destination)
            .field("callback", &self.callback.as_ref().map(|_| ".."))
            .field("field_name", &self.field_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Multipart {
    boundary: String,
    preamble: Vec<u8>,
    epilogue: Vec<u8>,
}

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Pull-style upload stream: framing, tracked file bytes, framing.
pub type UploadReader = io::Chain<io::Chain<Cursor<Vec<u8>>, ProgressReader<File>>, Cursor<Vec<u8>>>;

/// A validated file upload.
pub struct UploadBody {
    path: PathBuf,
    file_content_type: String,
    callback: Arc<dyn TransferProgressCallback>,
    total_bytes: u64,
    multipart: Option<Multipart>,
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBody")
            .field("path", &self.path)
            .field("content_type", &self.content_type())
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl UploadBody {
    /// The file's bytes as the whole request body.
    pub fn raw(path: impl AsRef<Path>, options: UploadOptions) -> Result<Self, UploadError> {
        Self::build(path.as_ref(), options, false)
    }

    /// The file as the single part of a `multipart/form-data` body.
    pub fn multipart(path: impl AsRef<Path>, options: UploadOptions) -> Result<Self, UploadError> {
        Self::build(path.as_ref(), options, true)
    }

    fn build(path: &Path, options: UploadOptions, multipart: bool) -> Result<Self, UploadError> {
        let field_name = options
            .field_name
            .unwrap_or_else(|| DEFAULT_FIELD_NAME.to_string());
        if multipart && field_name.trim().is_empty() {
            return Err(UploadError::BlankFieldName);
        }
        let total_bytes = validate_file(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file_content_type = options
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| sniff_content_type(path));

        let callback = match options.callback {
            Some(cb) => cb,
            None => {
                let prefix = format_prefix(&file_name, &options.destination)
                    .ok_or(UploadError::BlankDestination)?;
                Arc::new(LogProgressCallback::new(prefix, TransferType::Upload))
            }
        };

        let multipart = multipart.then(|| {
            let boundary = new_boundary();
            let preamble = format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary,
                escape_quoted(&field_name),
                escape_quoted(&file_name),
                file_content_type
            )
            .into_bytes();
            let epilogue = format!("\r\n--{}--\r\n", boundary).into_bytes();
            Multipart {
                boundary,
                preamble,
                epilogue,
            }
        });

        tracing::debug!(
            path = %path.display(),
            total_bytes,
            content_type = %file_content_type,
            multipart = multipart.is_some(),
            "prepared upload body"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_content_type,
            callback,
            total_bytes,
            multipart,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        match &self.multipart {
            Some(mp) => format!("multipart/form-data; boundary={}", mp.boundary),
            None => self.file_content_type.clone(),
        }
    }

    /// Exact number of body bytes, including multipart framing.
    pub fn content_length(&self) -> u64 {
        let framing = self
            .multipart
            .as_ref()
            .map(|mp| (mp.preamble.len() + mp.epilogue.len()) as u64)
            .unwrap_or(0);
        self.total_bytes + framing
    }

    /// Size of the file, which is what progress is reported against.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Write the whole body into `sink`, reporting file progress.
    ///
    /// Any failure, whether reading the file or writing framing or file
    /// bytes, is reported to the callback once before it is returned.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let mut file = self.open()?;
        if let Some(mp) = &self.multipart {
            sink.write_all(&mp.preamble).map_err(|e| self.report(e))?;
        }
        {
            // Sink errors on file bytes are reported by the tracked writer itself.
            let mut tracked = ProgressWriter::new(&mut *sink, Arc::clone(&self.callback), self.total_bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let mut buf = vec![0u8; COPY_BUF_SIZE];
            loop {
                let n = match file.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(self.report(e)),
                };
                tracked.write_all(&buf[..n])?;
            }
            tracked.flush()?;
        }
        if let Some(mp) = &self.multipart {
            sink.write_all(&mp.epilogue).map_err(|e| self.report(e))?;
        }
        sink.flush().map_err(|e| self.report(e))
    }

    /// A fresh body stream. Each call reopens the file and restarts progress,
    /// so a retried request should take a new reader per attempt.
    pub fn reader(&self) -> io::Result<UploadReader> {
        let file = self.open()?;
        let tracked = ProgressReader::new(file, Arc::clone(&self.callback), self.total_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let (pre, post) = match &self.multipart {
            Some(mp) => (mp.preamble.clone(), mp.epilogue.clone()),
            None => (Vec::new(), Vec::new()),
        };
        Ok(Cursor::new(pre).chain(tracked).chain(Cursor::new(post)))
    }

    fn open(&self) -> io::Result<File> {
        File::open(&self.path).map_err(|e| self.report(e))
    }

    fn report(&self, error: io::Error) -> io::Error {
        self.callback.on_failure(&error);
        error
    }
}

/// Check that `path` is an existing, readable, non-empty regular file; returns its size.
fn validate_file(path: &Path) -> Result<u64, UploadError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(UploadError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(UploadError::Unreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !meta.is_file() {
        return Err(UploadError::NotAFile(path.to_path_buf()));
    }
    File::open(path).map_err(|source| UploadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() == 0 {
        return Err(UploadError::Empty(path.to_path_buf()));
    }
    Ok(meta.len())
}

/// MIME type guessed from the file extension, `application/octet-stream` if unknown.
pub fn sniff_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn new_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect();
    format!("hcx-{}", suffix)
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
