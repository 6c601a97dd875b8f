//! Engine wiring for one CLI invocation
//!
//! Opens the catalogue, builds the WebDAV transport and starts the provider
//! facade for the configured account.

use std::sync::Arc;

use anyhow::{Context, Result};
use nimbus_cache::{DatabasePool, SqliteStateRepository};
use nimbus_core::{config::Config, domain::AccountContext};
use nimbus_dav::{DavClient, DavTransport};
use nimbus_provider::{LocalStorage, ProviderFacade};
use tracing::{debug, info};

/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "NIMBUS_PASSWORD";

pub struct Session {
    pub facade: ProviderFacade,
    pub ctx: AccountContext,
    pool: DatabasePool,
}

impl Session {
    /// Starts the engine described by `config`
    ///
    /// Records a previous process left in flight are released before the
    /// session is handed out.
    pub async fn open(config: &Config) -> Result<Self> {
        let home = config
            .home_path()
            .context("Configured account has no usable home path")?;
        let ctx = AccountContext::new(config.server.user.clone(), home)
            .context("server.user is not configured")?;

        let pool = DatabasePool::new(&config.storage.database)
            .await
            .context("Failed to open catalogue")?;
        let repository = Arc::new(SqliteStateRepository::new(pool.pool().clone()));

        let password = std::env::var(PASSWORD_ENV).unwrap_or_default();
        let client = DavClient::new(
            &config.server,
            password,
            config.transfers.max_connections_per_host,
        )
        .context("Failed to create WebDAV client")?;
        let transport = Arc::new(DavTransport::new(client));

        let storage = LocalStorage::new(config.storage.root.clone()).with_context(|| {
            format!(
                "Failed to prepare storage root {}",
                config.storage.root.display()
            )
        })?;

        let facade = ProviderFacade::start(
            repository,
            transport,
            storage,
            config.transfers.max_concurrent_transfers as usize,
        );

        let recovered = facade.recover_interrupted(&ctx).await?;
        if recovered > 0 {
            info!(recovered, "Released interrupted transfers");
        }
        debug!(account = ctx.account(), home = %ctx.home_path(), "Session opened");

        Ok(Self { facade, ctx, pool })
    }

    /// Cancels outstanding transfers and closes the catalogue
    pub async fn close(self) {
        self.facade.shutdown().await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::{config::ConfigBuilder, domain::ItemIdentifier};
    use tempfile::TempDir;

    fn config(dir: &TempDir, user: &str) -> Config {
        ConfigBuilder::new()
            .server_base_url("http://127.0.0.1:9")
            .server_user(user)
            .storage_root(dir.path().join("storage"))
            .storage_database(dir.path().join("catalogue.db"))
            .build()
    }

    #[tokio::test]
    async fn test_open_fresh_session() {
        let dir = TempDir::new().unwrap();
        let session = Session::open(&config(&dir, "alice")).await.unwrap();

        assert_eq!(session.ctx.account(), "alice");
        assert_eq!(
            session.ctx.home_path().as_str(),
            "/remote.php/dav/files/alice"
        );
        let views = session
            .facade
            .enumerate(&session.ctx, &ItemIdentifier::Root)
            .await
            .unwrap();
        assert!(views.is_empty());
        assert!(dir.path().join("storage").is_dir());

        session.close().await;
    }

    #[tokio::test]
    async fn test_missing_user_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(Session::open(&config(&dir, "")).await.is_err());
    }
}
