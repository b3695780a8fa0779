use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{self, Storage};

pub const TRANSACTIONS_KEY: &str = "atm_transactions";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    BalanceInquiry,
    PinChange,
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::BalanceInquiry => "balance_inquiry",
            TransactionKind::PinChange => "pin_change",
        }
    }
}

/// TransactionCommand is a log entry before the log has stamped it with an id and time
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCommand {
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount: Option<Decimal>,
    pub description: String,
}

impl TransactionCommand {
    pub fn deposit(account_id: &str, amount: Decimal, description: &str) -> TransactionCommand {
        TransactionCommand {
            account_id: account_id.to_string(),
            kind: TransactionKind::Deposit,
            amount: Some(amount),
            description: description.to_string(),
        }
    }
    pub fn withdrawal(account_id: &str, amount: Decimal) -> TransactionCommand {
        TransactionCommand {
            account_id: account_id.to_string(),
            kind: TransactionKind::Withdrawal,
            amount: Some(amount),
            description: "Cash withdrawal".to_string(),
        }
    }
    pub fn login(account_id: &str) -> TransactionCommand {
        TransactionCommand {
            account_id: account_id.to_string(),
            kind: TransactionKind::BalanceInquiry,
            amount: None,
            description: "Login successful".to_string(),
        }
    }
    pub fn pin_change(account_id: &str) -> TransactionCommand {
        TransactionCommand {
            account_id: account_id.to_string(),
            kind: TransactionKind::PinChange,
            amount: None,
            description: "PIN changed successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

pub trait TransactionsRepo {
    fn append(&self, command: TransactionCommand) -> Result<Transaction>;
    /// list_for returns the account's transactions, newest first
    fn list_for(&self, account_id: &str) -> Result<Vec<Transaction>>;
}

/// StoredRepo keeps the whole log as one JSON array under TRANSACTIONS_KEY
pub struct StoredRepo<'a> {
    storage: &'a dyn Storage,
}

impl<'a> StoredRepo<'a> {
    pub fn new(storage: &'a dyn Storage) -> StoredRepo<'a> {
        StoredRepo { storage }
    }
    pub fn get_all(&self) -> Result<Vec<Transaction>> {
        Ok(storage::load_all(self.storage, TRANSACTIONS_KEY)?)
    }
}

impl<'a> TransactionsRepo for StoredRepo<'a> {
    fn append(
        &self,
        TransactionCommand {
            account_id,
            kind,
            amount,
            description,
        }: TransactionCommand,
    ) -> Result<Transaction> {
        let mut transactions = self.get_all()?;
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            account_id,
            kind,
            amount,
            timestamp: Utc::now(),
            description,
        };
        transactions.push(transaction.clone());
        storage::save_all(self.storage, TRANSACTIONS_KEY, &transactions)?;
        debug!(
            id = transaction.id.as_str(),
            account = transaction.account_id.as_str(),
            kind = transaction.kind.label(),
            "Logged transaction"
        );
        Ok(transaction)
    }
    fn list_for(&self, account_id: &str) -> Result<Vec<Transaction>> {
        let mut owned: Vec<(usize, Transaction)> = self
            .get_all()?
            .into_iter()
            .filter(|transaction| transaction.account_id == account_id)
            .enumerate()
            .collect();
        // equal timestamps fall back to append order, later first
        owned.sort_by(|(ai, a), (bi, b)| b.timestamp.cmp(&a.timestamp).then(bi.cmp(ai)));
        Ok(owned.into_iter().map(|(_, transaction)| transaction).collect())
    }
}
