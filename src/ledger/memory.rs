//! In-process ledger shared by every notary of a simulated federation

use super::{
    account_id, validate_account_id, validate_account_name, validate_detail_key, AccountDetail,
    AccountDetailStore, LedgerError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Account {
    creator: String,
    details: Vec<AccountDetail>,
}

/// Ledger state held in memory. Share it between notaries with an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creator of an account, if it exists
    pub async fn account_creator(&self, account_id: &str) -> Option<String> {
        let accounts = self.accounts.read().await;
        accounts.get(account_id).map(|a| a.creator.clone())
    }

    /// Number of accounts
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl AccountDetailStore for MemoryLedger {
    async fn create_account(
        &self,
        name: &str,
        domain: &str,
        creator: &str,
    ) -> Result<String, LedgerError> {
        validate_account_name(name)?;
        validate_account_name(domain)?;
        let id = account_id(name, domain);

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&id) {
            return Err(LedgerError::AccountAlreadyExists(id));
        }
        accounts.insert(
            id.clone(),
            Account {
                creator: creator.to_string(),
                details: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn set_account_detail(
        &self,
        account_id: &str,
        writer: &str,
        key: &str,
        value: &str,
    ) -> Result<(), LedgerError> {
        validate_detail_key(key)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        match account
            .details
            .iter_mut()
            .find(|d| d.writer == writer && d.key == key)
        {
            Some(detail) => detail.value = value.to_string(),
            None => account.details.push(AccountDetail {
                writer: writer.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }

    async fn get_account_details(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountDetail>, LedgerError> {
        validate_account_id(account_id)?;

        let accounts = self.accounts.read().await;
        accounts
            .get(account_id)
            .map(|a| a.details.clone())
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_account_once() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .create_account("abc", "btcSignCollect", "notary_a@notary")
            .await
            .unwrap();
        assert_eq!(id, "abc@btcSignCollect");
        assert_eq!(
            ledger.account_creator(&id).await.as_deref(),
            Some("notary_a@notary")
        );

        let again = ledger
            .create_account("abc", "btcSignCollect", "notary_b@notary")
            .await;
        assert!(matches!(again, Err(LedgerError::AccountAlreadyExists(_))));
        assert_eq!(ledger.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_details_per_writer() {
        let ledger = MemoryLedger::new();
        let id = ledger.create_account("abc", "dom", "a@notary").await.unwrap();

        ledger.set_account_detail(&id, "a@notary", "k1", "v1").await.unwrap();
        ledger.set_account_detail(&id, "b@notary", "k1", "v2").await.unwrap();
        ledger.set_account_detail(&id, "a@notary", "k1", "v3").await.unwrap();

        let details = ledger.get_account_details(&id).await.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].value, "v3");
        assert_eq!(details[1].writer, "b@notary");
    }

    #[tokio::test]
    async fn test_missing_account() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.get_account_details("nope@dom").await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            ledger.set_account_detail("nope@dom", "a@notary", "k", "v").await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }
}
