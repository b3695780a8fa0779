use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::storage::{self, Storage};

pub const ACCOUNTS_KEY: &str = "atm_accounts";

#[derive(Error, Debug, PartialEq)]
pub enum AccountError {
    // also covers non-positive amounts, the two are not told apart
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("account {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    id: String,
    card_number: String,
    // stored in clear text
    pin: String,
    holder_name: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl Account {
    /// open creates an account with a fresh id and creation time
    pub fn open(holder_name: &str, pin: &str, card_number: String, balance: Decimal) -> Account {
        Account {
            id: Uuid::new_v4().to_string(),
            card_number,
            pin: pin.to_string(),
            holder_name: holder_name.to_string(),
            balance,
            created_at: Utc::now(),
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn card_number(&self) -> &str {
        &self.card_number
    }
    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }
    pub fn balance(&self) -> Decimal {
        self.balance
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn matches(&self, card_number: &str, pin: &str) -> bool {
        self.card_number == card_number && self.pin == pin
    }
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO || amount > self.balance {
            return Err(AccountError::InsufficientFunds);
        }
        self.balance -= amount;
        Ok(())
    }
    pub fn set_pin(&mut self, pin: &str) {
        self.pin = pin.to_string();
    }
}

/// generate_card_number returns 16 random digits without a leading zero.
///
/// Nothing checks the result against existing cards.
pub fn generate_card_number<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(1_000_000_000_000_000u64..10_000_000_000_000_000u64)
        .to_string()
}

pub trait AccountsRepo {
    fn get_all(&self) -> Result<Vec<Account>>;
    fn get(&self, id: &str) -> Result<Option<Account>>;
    /// find_by_credentials returns the first account matching both card number and PIN
    fn find_by_credentials(&self, card_number: &str, pin: &str) -> Result<Option<Account>>;
    fn insert(&self, account: Account) -> Result<()>;
    fn update(&self, account: &Account) -> Result<()>;
}

/// StoredRepo keeps every account in one JSON array under ACCOUNTS_KEY
pub struct StoredRepo<'a> {
    storage: &'a dyn Storage,
}

impl<'a> StoredRepo<'a> {
    pub fn new(storage: &'a dyn Storage) -> StoredRepo<'a> {
        StoredRepo { storage }
    }
    fn save_all(&self, accounts: &[Account]) -> Result<()> {
        Ok(storage::save_all(self.storage, ACCOUNTS_KEY, accounts)?)
    }
}

impl<'a> AccountsRepo for StoredRepo<'a> {
    fn get_all(&self) -> Result<Vec<Account>> {
        Ok(storage::load_all(self.storage, ACCOUNTS_KEY)?)
    }
    fn get(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.get_all()?.into_iter().find(|account| account.id == id))
    }
    fn find_by_credentials(&self, card_number: &str, pin: &str) -> Result<Option<Account>> {
        Ok(self
            .get_all()?
            .into_iter()
            .find(|account| account.matches(card_number, pin)))
    }
    fn insert(&self, account: Account) -> Result<()> {
        let mut accounts = self.get_all()?;
        debug!(id = account.id.as_str(), "Storing new account");
        accounts.push(account);
        self.save_all(&accounts)
    }
    fn update(&self, account: &Account) -> Result<()> {
        let mut accounts = self.get_all()?;
        let slot = accounts
            .iter_mut()
            .find(|stored| stored.id == account.id)
            .ok_or_else(|| AccountError::NotFound(account.id.clone()))?;
        *slot = account.clone();
        self.save_all(&accounts)
    }
}
