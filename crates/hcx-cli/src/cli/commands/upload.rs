//! `hcx upload` – send a local file, raw or as multipart form data.

use anyhow::{Context, Result};
use hcx_core::config::HcxConfig;
use hcx_core::progress::{format_prefix, LogProgressCallback, TransferType};
use hcx_core::response::Response;
use hcx_core::retry::RetryStrategy;
use hcx_core::transport::{CurlTransport, Method};
use hcx_core::upload::{UploadBody, UploadOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Parsed `hcx upload` arguments.
#[derive(Debug)]
pub struct UploadArgs {
    pub file: PathBuf,
    pub url: String,
    pub multipart: bool,
    pub field: Option<String>,
    pub content_type: Option<String>,
    pub method: Method,
}

pub fn run_upload(cfg: &HcxConfig, args: UploadArgs) -> Result<()> {
    let strategy = cfg.retry_or_default().build()?;
    let transport = CurlTransport::from_config(cfg);

    let source = args.file.display().to_string();
    let callback = Arc::new(LogProgressCallback::new(
        format_prefix(&source, &args.url).unwrap_or_default(),
        TransferType::Upload,
    ));
    let mut options = UploadOptions::new(args.url.as_str()).callback(callback);
    if let Some(ct) = args.content_type {
        options = options.content_type(ct);
    }
    if let Some(field) = args.field {
        options = options.field_name(field);
    }
    let body = if args.multipart {
        UploadBody::multipart(&args.file, options)?
    } else {
        UploadBody::raw(&args.file, options)?
    };
    let content_type = body.content_type();
    tracing::debug!(
        file = %source,
        url = %args.url,
        content_type = %content_type,
        length = body.content_length(),
        "starting upload"
    );

    // A fresh reader per attempt restarts the file and its progress count.
    let outcome = strategy.invoke(|| {
        let reader = body.reader()?;
        transport.send(
            args.method,
            &args.url,
            &content_type,
            body.content_length(),
            reader,
        )
    });
    let attempts = outcome.attempts();
    let response = outcome
        .into_result()
        .with_context(|| format!("upload of {} to {} failed", source, args.url))?;

    eprintln!(
        "Uploaded {} bytes from {} (HTTP {}, {} attempt(s))",
        body.total_bytes(),
        source,
        response.status(),
        attempts
    );
    Ok(())
}
