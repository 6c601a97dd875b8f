//! Account context
//!
//! Every facade call receives an `AccountContext` explicitly instead of
//! reading a process-wide session.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::item::ItemRecord;
use super::newtypes::RemotePath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    /// Account identity (user name on the server)
    account: String,
    /// Remote path of the account's root container
    home_path: RemotePath,
}

impl AccountContext {
    pub fn new(account: impl Into<String>, home_path: RemotePath) -> Result<Self, DomainError> {
        let account = account.into();
        if account.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Account name cannot be empty".to_string(),
            ));
        }
        Ok(Self { account, home_path })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn home_path(&self) -> &RemotePath {
        &self.home_path
    }

    /// The synthetic root directory record for this account
    pub fn root_record(&self) -> ItemRecord {
        ItemRecord::root(self.home_path.clone())
    }
}
