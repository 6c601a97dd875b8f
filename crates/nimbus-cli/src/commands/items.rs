//! Ls/Info commands - Browse the catalogue
//!
//! `nimbus ls <container>` lists a container (or the working set) and
//! `nimbus info <identifier>` shows one item together with its local path.

use anyhow::{Context, Result};
use clap::Args;
use nimbus_core::domain::{ItemIdentifier, ItemView};
use tracing::info;

use crate::output::{format_bytes, get_formatter, item_line, OutputFormatter};
use crate::session::Session;
use crate::Invocation;

/// List the items of a container
#[derive(Debug, Args)]
pub struct LsCommand {
    /// Container identifier: `root`, `working-set` or a directory id
    #[arg(default_value = "root")]
    pub container: ItemIdentifier,
}

impl LsCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let session = Session::open(&invocation.config).await?;

        info!(container = %self.container, "Listing container");
        let listing = session.facade.enumerate(&session.ctx, &self.container).await;
        session.close().await;
        let views = listing.with_context(|| format!("Failed to list {}", self.container))?;

        if invocation.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "container": self.container,
                "items": views,
            }));
        } else if views.is_empty() {
            formatter.info(&format!("{} is empty", self.container));
        } else {
            for view in &views {
                formatter.info(&item_line(view));
            }
        }
        Ok(())
    }
}

/// Show the state of one item
#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Item identifier
    pub identifier: ItemIdentifier,
}

impl InfoCommand {
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let formatter = get_formatter(invocation.format);
        let session = Session::open(&invocation.config).await?;

        let lookup = async {
            let view = session.facade.item(&session.ctx, &self.identifier).await?;
            let path = session
                .facade
                .path_for_identifier(&session.ctx, &self.identifier)
                .await?;
            Ok::<_, nimbus_provider::ProviderError>((view, path))
        }
        .await;
        session.close().await;
        let (view, path) = lookup.with_context(|| format!("Failed to look up {}", self.identifier))?;

        if invocation.format.is_json() {
            let mut json = serde_json::to_value(&view).context("Failed to serialize item")?;
            json["local_path"] = serde_json::Value::String(path.display().to_string());
            formatter.print_json(&json);
        } else {
            print_details(&*formatter, &view);
            formatter.info(&format!("Local path:  {}", path.display()));
        }
        Ok(())
    }
}

fn print_details(formatter: &dyn OutputFormatter, view: &ItemView) {
    formatter.success(&format!("{} [{}]", view.name, view.identifier));
    formatter.info(&format!("Parent:      {}", view.parent_identifier));
    formatter.info(&format!(
        "Kind:        {}",
        if view.is_directory { "directory" } else { "file" }
    ));
    if !view.is_directory {
        formatter.info(&format!("Size:        {}", format_bytes(view.size)));
    }
    formatter.info(&format!(
        "Modified:    {}",
        view.modified_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(token) = &view.version_token {
        formatter.info(&format!("Version:     {}", token));
    }
    formatter.info(&format!("Status:      {}", view.status.name()));
    formatter.info(&format!(
        "Downloaded:  {}",
        if view.is_downloaded { "yes" } else { "no" }
    ));
    if let Some(rank) = view.favorite_rank {
        formatter.info(&format!("Favorite:    #{}", rank));
    }
    if let Some(message) = &view.download_error {
        formatter.warn(&format!("Download failed: {}", message));
    }
    if let Some(message) = &view.upload_error {
        formatter.warn(&format!("Upload failed: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ls_parses_sentinels() {
        let cmd = LsCommand {
            container: "working-set".parse().unwrap(),
        };
        assert_eq!(cmd.container, ItemIdentifier::WorkingSet);
    }

    #[test]
    fn test_info_parses_item_identifier() {
        let cmd = InfoCommand {
            identifier: "00042ocabc".parse().unwrap(),
        };
        assert!(cmd.identifier.item_id().is_some());
    }
}
