//! `hcx get` – download a URL through the configured retry strategy.

use anyhow::{Context, Result};
use hcx_core::config::HcxConfig;
use hcx_core::progress::{format_prefix, LogProgressCallback, TransferProgressCallback, TransferType};
use hcx_core::response::Response;
use hcx_core::retry::{RetryError, RetryStrategy};
use hcx_core::transport::CurlTransport;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

pub fn run_get(cfg: &HcxConfig, url: &str, output: Option<&Path>) -> Result<()> {
    let strategy = cfg.retry_or_default().build()?;
    let transport = CurlTransport::from_config(cfg);
    let dest = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    let prefix = format_prefix(url, &dest).unwrap_or_default();
    // Fresh per attempt so a retry logs its percentages from zero.
    let progress = || -> Option<Arc<dyn TransferProgressCallback>> {
        Some(Arc::new(LogProgressCallback::new(prefix.clone(), TransferType::Download)))
    };

    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let outcome = strategy.invoke(|| {
                truncate(&file)?;
                transport.get_to(url, &file, progress())
            });
            let attempts = outcome.attempts();
            finish(url, attempts, outcome.into_result())?;
            let bytes = file.metadata()?.len();
            eprintln!(
                "Saved {} bytes to {} ({} attempt(s))",
                bytes,
                path.display(),
                attempts
            );
        }
        None => {
            // Buffered so a failed attempt cannot leave partial output on stdout.
            let mut body = Vec::<u8>::new();
            let outcome = strategy.invoke(|| {
                body.clear();
                transport.get_to(url, &mut body, progress())
            });
            let attempts = outcome.attempts();
            finish(url, attempts, outcome.into_result())?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&body)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Start the file over for a new attempt.
fn truncate(mut file: &File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn finish<R: Response>(url: &str, attempts: u32, result: Result<R, RetryError>) -> Result<()> {
    let response = result.with_context(|| format!("GET {} failed", url))?;
    tracing::info!(url, attempts, status = response.status(), "download succeeded");
    Ok(())
}
