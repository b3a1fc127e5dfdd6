//! Directory-backed ledger
//!
//! Lets several notary processes on one host share a ledger. Layout:
//!
//! ```text
//! <root>/<name@domain>/_creator          account creator
//! <root>/<name@domain>/<writer>.<key>.json  one AccountDetail per file
//! ```
//!
//! `create_dir` is atomic, so exactly one creator wins a race. Details are
//! written to a temporary file and renamed into place so readers never see
//! a partial entry.

use super::{
    account_id, validate_account_id, validate_account_name, validate_detail_key, AccountDetail,
    AccountDetailStore, LedgerError,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const CREATOR_FILE: &str = "_creator";
const DETAIL_EXTENSION: &str = "json";

/// Ledger stored as one directory per account
#[derive(Debug, Clone)]
pub struct DirLedger {
    root: PathBuf,
}

impl DirLedger {
    /// Open (or lazily create) a ledger rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn account_dir(&self, account_id: &str) -> PathBuf {
        self.root.join(account_id)
    }

    fn detail_file_name(writer: &str, key: &str) -> String {
        format!("{}.{}.{}", hex::encode(writer), key, DETAIL_EXTENSION)
    }
}

#[async_trait]
impl AccountDetailStore for DirLedger {
    async fn create_account(
        &self,
        name: &str,
        domain: &str,
        creator: &str,
    ) -> Result<String, LedgerError> {
        validate_account_name(name)?;
        validate_account_name(domain)?;
        let id = account_id(name, domain);

        fs::create_dir_all(&self.root).await?;
        let dir = self.account_dir(&id);
        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LedgerError::AccountAlreadyExists(id));
            }
            Err(e) => return Err(e.into()),
        }
        fs::write(dir.join(CREATOR_FILE), creator).await?;

        Ok(id)
    }

    async fn set_account_detail(
        &self,
        account_id: &str,
        writer: &str,
        key: &str,
        value: &str,
    ) -> Result<(), LedgerError> {
        validate_account_id(account_id)?;
        validate_detail_key(key)?;

        let dir = self.account_dir(account_id);
        if !fs::try_exists(&dir).await? {
            return Err(LedgerError::AccountNotFound(account_id.to_string()));
        }

        let detail = AccountDetail {
            writer: writer.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        let json = serde_json::to_string(&detail)?;

        let file_name = Self::detail_file_name(writer, key);
        let temp_path = dir.join(format!(".{}.tmp", file_name));
        fs::write(&temp_path, json).await?;

        // Atomic rename
        fs::rename(&temp_path, dir.join(file_name)).await?;
        Ok(())
    }

    async fn get_account_details(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountDetail>, LedgerError> {
        validate_account_id(account_id)?;

        let dir = self.account_dir(account_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LedgerError::AccountNotFound(account_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_detail = path.extension().and_then(|e| e.to_str()) == Some(DETAIL_EXTENSION);
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if is_detail && !is_temp {
                paths.push(path);
            }
        }
        paths.sort();

        let mut details = Vec::with_capacity(paths.len());
        for path in paths {
            let json = fs::read_to_string(&path).await?;
            details.push(serde_json::from_str(&json)?);
        }
        Ok(details)
    }
}
