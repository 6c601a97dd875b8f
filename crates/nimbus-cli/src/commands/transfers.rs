//! Fetch/Push/Evict/Import commands - Move content between server and disk
//!
//! Each command opens a session, hands the request to the provider facade
//! and, for transfers, waits for the outcome while printing progress.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use nimbus_core::domain::ItemIdentifier;
use nimbus_provider::{TransferHandle, TransferResult};
use tracing::info;

use crate::output::{get_formatter, OutputFormatter};
use crate::session::Session;
use crate::Invocation;

/// Download the content of an item and wait for it
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Item identifier
    pub identifier: ItemIdentifier,
}

impl FetchCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let session = Session::open(&invocation.config).await?;

        let outcome = async {
            let handle = session
                .facade
                .materialize(&session.ctx, &self.identifier)
                .await?;
            let result = wait_with_progress(handle, &*formatter).await;
            let path = session
                .facade
                .path_for_identifier(&session.ctx, &self.identifier)
                .await?;
            Ok::<_, nimbus_provider::ProviderError>((result, path))
        }
        .await;
        session.close().await;
        let (result, path) = outcome.with_context(|| format!("Failed to fetch {}", self.identifier))?;

        report(
            invocation,
            &*formatter,
            "fetch",
            &self.identifier.to_string(),
            result,
            Some(&path),
        )
    }
}

/// Upload the locally modified content at a path
#[derive(Debug, Args)]
pub struct PushCommand {
    /// Content path inside the storage root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

impl PushCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let path = absolute(&self.path)?;
        let session = Session::open(&invocation.config).await?;

        let outcome = async {
            let handle = session.facade.content_changed(&session.ctx, &path).await?;
            Ok::<_, nimbus_provider::ProviderError>(wait_with_progress(handle, &*formatter).await)
        }
        .await;
        session.close().await;
        let result = outcome.with_context(|| format!("Failed to push {}", path.display()))?;

        report(
            invocation,
            &*formatter,
            "push",
            &path.display().to_string(),
            result,
            None,
        )
    }
}

/// Drop the local content at a path
#[derive(Debug, Args)]
pub struct EvictCommand {
    /// Content path inside the storage root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

impl EvictCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let path = absolute(&self.path)?;
        let session = Session::open(&invocation.config).await?;

        info!(path = %path.display(), "Evicting");
        let outcome = session.facade.evict(&session.ctx, &path).await;
        session.close().await;
        outcome.with_context(|| format!("Failed to evict {}", path.display()))?;

        if invocation.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "operation": "evict",
                "target": path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Evicted {}", path.display()));
        }
        Ok(())
    }
}

/// Add a local file to a container and upload it
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Local file to import
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination container
    #[arg(long, default_value = "root")]
    pub parent: ItemIdentifier,
}

impl ImportCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let session = Session::open(&invocation.config).await?;

        let outcome = async {
            let handle = session
                .facade
                .import(&session.ctx, &self.source, &self.parent)
                .await?;
            Ok::<_, nimbus_provider::ProviderError>(wait_with_progress(handle, &*formatter).await)
        }
        .await;
        session.close().await;
        let result =
            outcome.with_context(|| format!("Failed to import {}", self.source.display()))?;

        report(
            invocation,
            &*formatter,
            "import",
            &self.source.display().to_string(),
            result,
            None,
        )
    }
}

/// Waits for `handle` to settle, printing each new progress step
async fn wait_with_progress(
    handle: TransferHandle,
    formatter: &dyn OutputFormatter,
) -> TransferResult {
    let mut progress = handle.subscribe_progress();
    let wait = handle.wait();
    tokio::pin!(wait);

    loop {
        tokio::select! {
            result = &mut wait => return result,
            changed = progress.changed() => {
                if changed.is_err() {
                    return (&mut wait).await;
                }
                if let Some(fraction) = *progress.borrow_and_update() {
                    formatter.info(&progress_label(fraction));
                }
            }
        }
    }
}

fn progress_label(fraction: f64) -> String {
    format!("{:>3.0}%", (fraction.clamp(0.0, 1.0) * 100.0).floor())
}

fn report(
    invocation: &Invocation,
    formatter: &dyn OutputFormatter,
    operation: &str,
    target: &str,
    result: TransferResult,
    path: Option<&Path>,
) -> Result<()> {
    let completed = result.is_completed();

    if invocation.format.is_json() {
        let mut json = serde_json::json!({
            "success": completed,
            "operation": operation,
            "target": target,
        });
        if let Some(path) = path {
            json["local_path"] = serde_json::Value::String(path.display().to_string());
        }
        if let TransferResult::Failed {
            message,
            status_code,
            ..
        } = &result
        {
            json["error"] = serde_json::Value::String(message.clone());
            json["status_code"] = serde_json::json!(status_code);
        }
        formatter.print_json(&json);
    } else if completed {
        formatter.success(&format!("{} {} done", operation, target));
        if let Some(path) = path {
            formatter.info(&format!("Local path: {}", path.display()));
        }
    }

    result
        .into_result()
        .with_context(|| format!("{} {} did not complete", operation, target))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label(0.0), "  0%");
        assert_eq!(progress_label(0.505), " 50%");
        assert_eq!(progress_label(1.0), "100%");
        assert_eq!(progress_label(1.7), "100%");
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let path = Path::new("/var/lib/nimbus/storage/F1/a.txt");
        assert_eq!(absolute(path).unwrap(), path);
    }

    #[test]
    fn test_absolute_joins_relative_paths() {
        let resolved = absolute(Path::new("F1/a.txt")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("F1/a.txt"));
    }
}
