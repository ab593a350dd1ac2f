//! `hcx config` – show where the config lives and what is in effect.

use anyhow::Result;
use hcx_core::config::{self, HcxConfig};

pub fn run_config(cfg: &HcxConfig) -> Result<()> {
    let path = config::config_path()?;
    let retry = cfg.retry_or_default();
    println!("config file:      {}", path.display());
    println!("user agent:       {}", cfg.user_agent);
    println!("connect timeout:  {}s", cfg.connect_timeout_secs);
    println!("request timeout:  {}s", cfg.timeout_secs);
    println!("retry strategy:   {:?}", retry.strategy);
    println!("max attempts:     {}", retry.max_attempts);
    println!("base delay:       {}ms", retry.base_delay_ms);
    println!("max jitter:       {}ms", retry.max_jitter_ms);
    println!("max total delay:  {}ms", retry.max_total_delay_ms);
    println!("retry-after:      {}s", retry.default_retry_after_secs);
    // Surface a bad [retry] section here rather than on the first transfer.
    retry.build()?;
    Ok(())
}
