//! CLI for the HCX retrying HTTP client.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hcx_core::config;
use hcx_core::transport::Method;
use std::path::PathBuf;

use commands::{run_config, run_get, run_upload, UploadArgs};

/// Top-level CLI for hcx.
#[derive(Debug, Parser)]
#[command(name = "hcx")]
#[command(about = "hcx: HTTP transfers with retry, backoff and progress reporting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, retrying per the configured strategy.
    Get {
        /// HTTP/HTTPS URL to fetch.
        url: String,
        /// Write the body to this file instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Upload a local file to a URL.
    Upload {
        /// File to send.
        file: PathBuf,
        /// Destination URL.
        url: String,
        /// Wrap the file in a multipart/form-data body.
        #[arg(long)]
        multipart: bool,
        /// Form field name for multipart uploads.
        #[arg(long, value_name = "NAME")]
        field: Option<String>,
        /// Content type of the file; guessed from the extension when omitted.
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
        /// HTTP method.
        #[arg(long, value_enum, default_value_t = MethodArg::Put)]
        method: MethodArg,
    },

    /// Show the config file path and effective settings.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum MethodArg {
    Put,
    Post,
}

impl From<MethodArg> for Method {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Put => Method::Put,
            MethodArg::Post => Method::Post,
        }
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init().context("loading config")?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get { url, output } => run_get(&cfg, &url, output.as_deref())?,
            CliCommand::Upload {
                file,
                url,
                multipart,
                field,
                content_type,
                method,
            } => run_upload(
                &cfg,
                UploadArgs {
                    file,
                    url,
                    multipart,
                    field,
                    content_type,
                    method: method.into(),
                },
            )?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
