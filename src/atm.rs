use anyhow::Result;
use rust_decimal::prelude::*;
use tracing::{debug, info};

use crate::accounts::{self, Account, AccountError, AccountsRepo};
use crate::config::Config;
use crate::session::Session;
use crate::transactions::{Transaction, TransactionCommand, TransactionsRepo};

/// last_four keeps card numbers out of the logs
fn last_four(card_number: &str) -> &str {
    let len = card_number.len();
    card_number.get(len.saturating_sub(4)..).unwrap_or("")
}

/// Atm runs account operations against the repositories and records each one in the
/// transaction log. Callers pass in the session the operation acts on.
pub struct Atm<'a> {
    accounts: &'a dyn AccountsRepo,
    transactions: &'a dyn TransactionsRepo,
    config: Config,
}

impl<'a> Atm<'a> {
    pub fn new(
        accounts: &'a dyn AccountsRepo,
        transactions: &'a dyn TransactionsRepo,
        config: Config,
    ) -> Atm<'a> {
        Atm {
            accounts,
            transactions,
            config,
        }
    }
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// create_account opens an account on a random card number with the starting
    /// balance and logs the opening deposit
    pub fn create_account(&self, holder_name: &str, pin: &str) -> Result<Account> {
        let card_number = accounts::generate_card_number(&mut rand::thread_rng());
        let account = Account::open(
            holder_name,
            pin,
            card_number,
            self.config.starting_balance,
        );
        self.accounts.insert(account.clone())?;
        self.transactions.append(TransactionCommand::deposit(
            account.id(),
            account.balance(),
            "Account opening deposit",
        ))?;
        info!(
            account = account.id(),
            card = last_four(account.card_number()),
            "Opened account"
        );
        Ok(account)
    }

    pub fn authenticate(&self, card_number: &str, pin: &str) -> Result<Option<Account>> {
        self.accounts.find_by_credentials(card_number, pin)
    }

    /// login authenticates and, on success, logs the login and attaches the account
    /// to the session
    pub fn login(&self, session: &mut Session, card_number: &str, pin: &str) -> Result<bool> {
        let account = match self.authenticate(card_number, pin)? {
            Some(account) => account,
            None => {
                debug!(card = last_four(card_number), "Login refused");
                return Ok(false);
            }
        };
        self.transactions
            .append(TransactionCommand::login(account.id()))?;
        info!(account = account.id(), "Logged in");
        session.set_account(account);
        Ok(true)
    }

    /// withdraw succeeds only when 0 < amount <= balance, anything else returns false
    /// and changes nothing
    pub fn withdraw(&self, session: &mut Session, amount: Decimal) -> Result<bool> {
        let id = match session.account() {
            Some(account) => account.id().to_string(),
            None => return Ok(false),
        };
        let mut account = self
            .accounts
            .get(&id)?
            .ok_or_else(|| AccountError::NotFound(id.clone()))?;
        if let Err(e) = account.withdraw(amount) {
            debug!(
                error = e.to_string(),
                account = id.as_str(),
                amount = amount.to_string(),
                "Withdrawal declined"
            );
            return Ok(false);
        }
        self.accounts.update(&account)?;
        self.transactions
            .append(TransactionCommand::withdrawal(&id, amount))?;
        info!(
            account = id.as_str(),
            amount = amount.to_string(),
            "Cash withdrawn"
        );
        session.set_account(account);
        Ok(true)
    }

    /// change_pin overwrites the PIN of the session's account. It only fails when
    /// nobody is logged in, callers validate the new PIN beforehand.
    pub fn change_pin(&self, session: &mut Session, new_pin: &str) -> Result<bool> {
        let id = match session.account() {
            Some(account) => account.id().to_string(),
            None => return Ok(false),
        };
        let mut account = self
            .accounts
            .get(&id)?
            .ok_or_else(|| AccountError::NotFound(id.clone()))?;
        account.set_pin(new_pin);
        self.accounts.update(&account)?;
        self.transactions
            .append(TransactionCommand::pin_change(&id))?;
        info!(account = id.as_str(), "PIN changed");
        session.set_account(account);
        Ok(true)
    }

    /// history lists the session account's transactions, newest first
    pub fn history(&self, session: &Session) -> Result<Vec<Transaction>> {
        match session.account() {
            Some(account) => self.transactions.list_for(account.id()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::StoredRepo as AccountsStoredRepo;
    use crate::storage::MemoryStorage;
    use crate::transactions::{StoredRepo as TransactionsStoredRepo, TransactionKind};

    #[test]
    fn test_last_four() {
        assert_eq!(last_four("4000123412345678"), "5678");
        assert_eq!(last_four("12"), "12");
        assert_eq!(last_four(""), "");
    }

    #[test]
    fn test_create_account() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());

        let acc = atm.create_account("Alice", "1234")?;
        assert_eq!(acc.balance(), Decimal::new(100000, 2));
        assert_eq!(acc.card_number().len(), 16);
        assert_eq!(accounts.get_all()?, vec![acc.clone()]);

        let log = transactions.list_for(acc.id())?;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionKind::Deposit);
        assert_eq!(log[0].amount, Some(Decimal::from(1000)));
        assert_eq!(log[0].description, "Account opening deposit");
        Ok(())
    }

    #[test]
    fn test_create_account_uses_configured_balance() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let config = Config {
            starting_balance: Decimal::from(50),
            ..Config::default()
        };
        let atm = Atm::new(&accounts, &transactions, config);
        let acc = atm.create_account("Bob", "0000")?;
        assert_eq!(acc.balance(), Decimal::from(50));
        assert_eq!(
            transactions.list_for(acc.id())?[0].amount,
            Some(Decimal::from(50))
        );
        Ok(())
    }

    #[test]
    fn test_authenticate() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;

        assert_eq!(atm.authenticate(acc.card_number(), "1234")?, Some(acc.clone()));
        assert_eq!(atm.authenticate(acc.card_number(), "1235")?, None);
        assert_eq!(atm.authenticate("0000000000000000", "1234")?, None);
        assert_eq!(atm.authenticate("", "")?, None);
        Ok(())
    }

    #[test]
    fn test_login() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;

        let mut session = Session::new();
        assert!(!atm.login(&mut session, acc.card_number(), "9999")?);
        assert!(!session.is_authenticated());
        assert_eq!(transactions.list_for(acc.id())?.len(), 1);

        assert!(atm.login(&mut session, acc.card_number(), "1234")?);
        assert_eq!(session.account(), Some(&acc));
        let log = transactions.list_for(acc.id())?;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, TransactionKind::BalanceInquiry);
        assert_eq!(log[0].amount, None);
        assert_eq!(log[0].description, "Login successful");
        Ok(())
    }

    #[test]
    fn test_withdraw() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;
        let mut session = Session::new();
        atm.login(&mut session, acc.card_number(), "1234")?;

        assert!(atm.withdraw(&mut session, Decimal::new(2550, 2))?);
        let expected = Decimal::new(97450, 2);
        assert_eq!(session.account().map(|a| a.balance()), Some(expected));
        assert_eq!(accounts.get(acc.id())?.map(|a| a.balance()), Some(expected));

        let log = transactions.list_for(acc.id())?;
        assert_eq!(log[0].kind, TransactionKind::Withdrawal);
        assert_eq!(log[0].amount, Some(Decimal::new(2550, 2)));
        assert_eq!(log[0].description, "Cash withdrawal");
        Ok(())
    }

    #[test]
    fn test_withdraw_entire_balance() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;
        let mut session = Session::new();
        atm.login(&mut session, acc.card_number(), "1234")?;

        assert!(atm.withdraw(&mut session, Decimal::from(1000))?);
        assert_eq!(session.account().map(|a| a.balance()), Some(Decimal::ZERO));
        assert!(!atm.withdraw(&mut session, Decimal::new(1, 2))?);
        Ok(())
    }

    #[test]
    fn test_withdraw_declined_leaves_no_trace() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;
        let mut session = Session::new();
        atm.login(&mut session, acc.card_number(), "1234")?;
        let logged = transactions.list_for(acc.id())?.len();

        for amount in vec![Decimal::from(1001), Decimal::ZERO, Decimal::from(-10)] {
            assert!(!atm.withdraw(&mut session, amount)?);
        }
        assert_eq!(accounts.get(acc.id())?.map(|a| a.balance()), Some(Decimal::from(1000)));
        assert_eq!(session.account().map(|a| a.balance()), Some(Decimal::from(1000)));
        assert_eq!(transactions.list_for(acc.id())?.len(), logged);
        Ok(())
    }

    #[test]
    fn test_withdraw_without_session() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let mut session = Session::new();
        assert!(!atm.withdraw(&mut session, Decimal::from(10))?);
        assert!(!atm.change_pin(&mut session, "1111")?);
        assert!(atm.history(&session)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_change_pin() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let acc = atm.create_account("Alice", "1234")?;
        let mut session = Session::new();
        atm.login(&mut session, acc.card_number(), "1234")?;

        assert!(atm.change_pin(&mut session, "4321")?);
        assert_eq!(
            session.account().map(|a| a.matches(acc.card_number(), "4321")),
            Some(true)
        );
        assert_eq!(atm.authenticate(acc.card_number(), "1234")?, None);
        assert!(atm.authenticate(acc.card_number(), "4321")?.is_some());

        let log = transactions.list_for(acc.id())?;
        assert_eq!(log[0].kind, TransactionKind::PinChange);
        assert_eq!(log[0].amount, None);
        assert_eq!(log[0].description, "PIN changed successfully");
        Ok(())
    }

    #[test]
    fn test_alice_scenario() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());

        let acc = atm.create_account("Alice", "1234")?;
        assert_eq!(acc.balance(), Decimal::new(100000, 2));

        let found = atm.authenticate(acc.card_number(), "1234")?;
        assert_eq!(found.as_ref().map(|a| a.holder_name()), Some("Alice"));

        let mut session = Session::new();
        assert!(atm.login(&mut session, acc.card_number(), "1234")?);
        assert!(atm.withdraw(&mut session, Decimal::from(200))?);
        assert_eq!(session.account().map(|a| a.balance()), Some(Decimal::new(80000, 2)));

        let withdrawals: Vec<Transaction> = atm
            .history(&session)?
            .into_iter()
            .filter(|t| t.kind == TransactionKind::Withdrawal)
            .collect();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].amount, Some(Decimal::new(20000, 2)));

        assert!(!atm.withdraw(&mut session, Decimal::from(900))?);
        assert_eq!(
            accounts.get(acc.id())?.map(|a| a.balance()),
            Some(Decimal::new(80000, 2))
        );
        Ok(())
    }

    #[test]
    fn test_history_is_per_account() -> Result<()> {
        let storage = MemoryStorage::new();
        let accounts = AccountsStoredRepo::new(&storage);
        let transactions = TransactionsStoredRepo::new(&storage);
        let atm = Atm::new(&accounts, &transactions, Config::default());
        let alice = atm.create_account("Alice", "1234")?;
        let bob = atm.create_account("Bob", "5678")?;

        let mut session = Session::new();
        atm.login(&mut session, bob.card_number(), "5678")?;
        atm.withdraw(&mut session, Decimal::from(5))?;
        let history = atm.history(&session)?;
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|t| t.account_id == bob.id()));
        assert_eq!(history[0].kind, TransactionKind::Withdrawal);
        assert_eq!(history[2].kind, TransactionKind::Deposit);
        assert_eq!(transactions.list_for(alice.id())?.len(), 1);
        Ok(())
    }
}
