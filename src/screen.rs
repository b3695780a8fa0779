use std::fmt;

use anyhow::Result;
use rust_decimal::prelude::*;
use tracing::{debug, warn};

use crate::atm::Atm;
use crate::session::{is_valid_pin, Session, CARD_NUMBER_LEN, PIN_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Welcome,
    CreateAccount,
    InsertCard,
    EnterPin,
    MainMenu,
    BalanceInquiry,
    CashWithdrawal,
    PinChange,
    TransactionHistory,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Welcome => "WELCOME TO VIRTUAL ATM",
            Screen::CreateAccount => "CREATE NEW ACCOUNT",
            Screen::InsertCard => "CARD AUTHENTICATION",
            Screen::EnterPin => "ENTER PIN",
            Screen::MainMenu => "MAIN MENU",
            Screen::BalanceInquiry => "BALANCE INQUIRY",
            Screen::CashWithdrawal => "CASH WITHDRAWAL",
            Screen::PinChange => "CHANGE PIN",
            Screen::TransactionHistory => "TRANSACTION HISTORY",
        }
    }
    /// requires_account is true for every screen behind the login
    pub fn requires_account(&self) -> bool {
        !matches!(
            self,
            Screen::Welcome | Screen::CreateAccount | Screen::InsertCard | Screen::EnterPin
        )
    }
}

/// Action is one user interaction, the equivalent of pressing a button or typing
/// into a field on the current screen
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    InsertCard,
    OpenAccount,
    CreateAccount { holder_name: String, pin: String },
    EnterCardNumber(String),
    Continue,
    EnterPin(String),
    Login,
    ShowBalance,
    StartWithdrawal,
    StartPinChange,
    ShowHistory,
    Logout,
    EnterAmount(String),
    QuickAmount(u32),
    Withdraw,
    EnterNewPin(String),
    EnterConfirmPin(String),
    ChangePin,
    Back,
}

/// Alert is a message the user has to acknowledge
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    AccountCreated { card_number: String, balance: Decimal },
    InvalidAccountDetails,
    InvalidCardNumber,
    InvalidPin,
    LoginFailed,
    InvalidAmount,
    QuickAmountUnavailable(u32),
    Withdrawn(Decimal),
    WithdrawalDeclined,
    PinChanged,
    PinMismatch,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::AccountCreated {
                card_number,
                balance,
            } => write!(
                f,
                "Account created successfully!\nCard Number: {}\nInitial Balance: ${:.2}",
                card_number, balance
            ),
            Alert::InvalidAccountDetails => {
                f.write_str("Please provide valid information. PIN must be 4 digits.")
            }
            Alert::InvalidCardNumber => {
                write!(f, "Card number must be {} digits.", CARD_NUMBER_LEN)
            }
            Alert::InvalidPin => write!(f, "PIN must be {} digits.", PIN_LEN),
            Alert::LoginFailed => f.write_str("Invalid card number or PIN. Please try again."),
            Alert::InvalidAmount => f.write_str("Please enter a valid amount."),
            Alert::QuickAmountUnavailable(amount) => {
                write!(f, "${} is more than your balance.", amount)
            }
            Alert::Withdrawn(amount) => write!(f, "Successfully withdrawn ${:.2}", amount),
            Alert::WithdrawalDeclined => f.write_str("Insufficient funds or invalid amount."),
            Alert::PinChanged => f.write_str("PIN changed successfully!"),
            Alert::PinMismatch => f.write_str("PINs do not match or invalid length."),
        }
    }
}

impl Alert {
    /// is_failure is true for alerts that report something the user has to fix
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            Alert::AccountCreated { .. } | Alert::Withdrawn(_) | Alert::PinChanged
        )
    }
}

/// parse_amount accepts a positive decimal written as plain digits with at most
/// two fractional digits, e.g. `20` or `12.50`
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let input = input.trim();
    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (input, None),
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) {
        return None;
    }
    if let Some(fraction) = fraction {
        if !digits(fraction) || fraction.len() > 2 {
            return None;
        }
    }
    let amount = Decimal::from_str(input).ok()?;
    if amount <= Decimal::ZERO {
        return None;
    }
    Some(amount)
}

fn go(session: &mut Session, screen: Screen) -> Option<Alert> {
    session.set_screen(screen);
    None
}

/// dispatch applies one action to the session and returns the alert to show, if any.
///
/// Actions that the current screen does not offer are ignored. Only storage failures
/// come back as errors.
pub fn dispatch(atm: &Atm, session: &mut Session, action: Action) -> Result<Option<Alert>> {
    let screen = session.screen();
    if screen.requires_account() && !session.is_authenticated() {
        warn!(screen = screen.title(), "No account in session, restarting");
        session.reset();
        return Ok(None);
    }

    let alert = match (screen, action) {
        (Screen::Welcome, Action::InsertCard) => go(session, Screen::InsertCard),
        (Screen::Welcome, Action::OpenAccount) => go(session, Screen::CreateAccount),

        (Screen::CreateAccount, Action::CreateAccount { holder_name, pin }) => {
            let holder_name = holder_name.trim();
            if holder_name.is_empty() || !is_valid_pin(&pin) {
                Some(Alert::InvalidAccountDetails)
            } else {
                let account = atm.create_account(holder_name, &pin)?;
                session.set_screen(Screen::Welcome);
                Some(Alert::AccountCreated {
                    card_number: account.card_number().to_string(),
                    balance: account.balance(),
                })
            }
        }
        (Screen::CreateAccount, Action::Back) => go(session, Screen::Welcome),

        (Screen::InsertCard, Action::EnterCardNumber(input)) => {
            if session.set_card_number(&input) {
                None
            } else {
                Some(Alert::InvalidCardNumber)
            }
        }
        (Screen::InsertCard, Action::Continue) => {
            if session.card_number().len() == CARD_NUMBER_LEN {
                go(session, Screen::EnterPin)
            } else {
                Some(Alert::InvalidCardNumber)
            }
        }
        (Screen::InsertCard, Action::Back) => go(session, Screen::Welcome),

        (Screen::EnterPin, Action::EnterPin(input)) => {
            if session.set_pin(&input) {
                None
            } else {
                Some(Alert::InvalidPin)
            }
        }
        (Screen::EnterPin, Action::Login) => {
            if session.pin().len() != PIN_LEN {
                Some(Alert::InvalidPin)
            } else {
                let card_number = session.card_number().to_string();
                let pin = session.pin().to_string();
                if atm.login(session, &card_number, &pin)? {
                    go(session, Screen::MainMenu)
                } else {
                    session.clear_pin();
                    Some(Alert::LoginFailed)
                }
            }
        }
        (Screen::EnterPin, Action::Back) => {
            session.clear_pin();
            go(session, Screen::InsertCard)
        }

        (Screen::MainMenu, Action::ShowBalance) => go(session, Screen::BalanceInquiry),
        (Screen::MainMenu, Action::StartWithdrawal) => go(session, Screen::CashWithdrawal),
        (Screen::MainMenu, Action::StartPinChange) => go(session, Screen::PinChange),
        (Screen::MainMenu, Action::ShowHistory) => go(session, Screen::TransactionHistory),
        (Screen::MainMenu, Action::Logout) => {
            session.reset();
            None
        }

        (Screen::BalanceInquiry, Action::Back) | (Screen::TransactionHistory, Action::Back) => {
            go(session, Screen::MainMenu)
        }

        (Screen::CashWithdrawal, Action::EnterAmount(input)) => {
            session.set_withdrawal_amount(&input);
            None
        }
        (Screen::CashWithdrawal, Action::QuickAmount(amount))
            if atm.config().quick_amounts.contains(&amount) =>
        {
            let balance = session
                .account()
                .map(|account| account.balance())
                .unwrap_or_default();
            if Decimal::from(amount) > balance {
                Some(Alert::QuickAmountUnavailable(amount))
            } else {
                session.set_withdrawal_amount(&amount.to_string());
                None
            }
        }
        (Screen::CashWithdrawal, Action::Withdraw) => {
            match parse_amount(session.withdrawal_amount()) {
                None => Some(Alert::InvalidAmount),
                Some(amount) => {
                    if atm.withdraw(session, amount)? {
                        session.clear_withdrawal_amount();
                        session.set_screen(Screen::MainMenu);
                        Some(Alert::Withdrawn(amount))
                    } else {
                        Some(Alert::WithdrawalDeclined)
                    }
                }
            }
        }
        (Screen::CashWithdrawal, Action::Back) => {
            session.clear_withdrawal_amount();
            go(session, Screen::MainMenu)
        }

        (Screen::PinChange, Action::EnterNewPin(input)) => {
            if session.set_new_pin(&input) {
                None
            } else {
                Some(Alert::InvalidPin)
            }
        }
        (Screen::PinChange, Action::EnterConfirmPin(input)) => {
            if session.set_confirm_pin(&input) {
                None
            } else {
                Some(Alert::InvalidPin)
            }
        }
        (Screen::PinChange, Action::ChangePin) => {
            let new_pin = session.new_pin().to_string();
            if is_valid_pin(&new_pin) && new_pin == session.confirm_pin() {
                if atm.change_pin(session, &new_pin)? {
                    session.clear_pin_change();
                    session.set_screen(Screen::MainMenu);
                    Some(Alert::PinChanged)
                } else {
                    None
                }
            } else {
                Some(Alert::PinMismatch)
            }
        }
        (Screen::PinChange, Action::Back) => {
            session.clear_pin_change();
            go(session, Screen::MainMenu)
        }

        (screen, action) => {
            debug!(screen = screen.title(), action = ?action, "Ignoring action");
            None
        }
    };
    Ok(alert)
}
