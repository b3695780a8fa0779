use std::io::{BufRead, Write};

use anyhow::Result;
use rust_decimal::prelude::*;
use tracing::debug;

use crate::atm::Atm;
use crate::screen::{self, Action, Screen};
use crate::session::Session;
use crate::statement;

const QUIT: &str = "q";
const BACK: &str = "0";

/// masked shows only the last four digits of a card number
fn masked(card_number: &str) -> String {
    let len = card_number.len();
    format!(
        "**** **** **** {}",
        card_number.get(len.saturating_sub(4)..).unwrap_or("")
    )
}

/// Terminal is a line based front end: it draws the current screen, reads a line
/// and turns it into router actions
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Terminal<R, W> {
        Terminal { input, output }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    /// run loops until the user quits or the input ends
    pub fn run(&mut self, atm: &Atm, session: &mut Session) -> Result<()> {
        loop {
            self.render(atm, session)?;
            let actions = match self.read_actions(atm, session)? {
                Some(actions) => actions,
                None => break,
            };
            for action in actions {
                if let Some(alert) = screen::dispatch(atm, session, action)? {
                    writeln!(self.output)?;
                    for line in alert.to_string().lines() {
                        writeln!(self.output, "!! {}", line)?;
                    }
                    // stop at the first alert, the user stays where the alert left them
                    break;
                }
            }
        }
        writeln!(self.output, "Thank you for using Virtual ATM. Goodbye.")?;
        self.output.flush()?;
        Ok(())
    }

    /// prompt returns None once the input is exhausted
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            debug!("Input closed");
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn render(&mut self, atm: &Atm, session: &Session) -> Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "========================================")?;
        writeln!(out, "{:^40}", session.screen().title())?;
        writeln!(out, "========================================")?;
        match session.screen() {
            Screen::Welcome => {
                writeln!(out, "Please select an option to begin.")?;
                writeln!(out, " 1) Insert card / login")?;
                writeln!(out, " 2) Create new account")?;
                writeln!(out, " q) Quit")?;
            }
            Screen::CreateAccount => {
                writeln!(
                    out,
                    "New accounts start with a balance of ${:.2}.",
                    atm.config().starting_balance
                )?;
                writeln!(out, " 1) Create account")?;
                writeln!(out, " 0) Back to main")?;
            }
            Screen::InsertCard => {
                writeln!(out, "Enter your 16-digit card number, or 0 to cancel.")?;
            }
            Screen::EnterPin => {
                writeln!(out, "Card: {}", masked(session.card_number()))?;
                writeln!(out, "Enter your 4-digit PIN, or 0 to go back.")?;
            }
            Screen::MainMenu => {
                if let Some(account) = session.account() {
                    writeln!(out, "Welcome, {}", account.holder_name())?;
                }
                writeln!(out, " 1) Balance inquiry")?;
                writeln!(out, " 2) Cash withdrawal")?;
                writeln!(out, " 3) Change PIN")?;
                writeln!(out, " 4) Transaction history")?;
                writeln!(out, " 5) Log out")?;
            }
            Screen::BalanceInquiry => {
                if let Some(account) = session.account() {
                    writeln!(out, "Available balance: ${:.2}", account.balance())?;
                    writeln!(out, "Account holder:    {}", account.holder_name())?;
                    writeln!(out, "Card:              {}", masked(account.card_number()))?;
                    writeln!(
                        out,
                        "Member since:      {}",
                        account.created_at().format("%Y-%m-%d")
                    )?;
                }
                writeln!(out, "Press Enter to return to the menu.")?;
            }
            Screen::CashWithdrawal => {
                let balance = session
                    .account()
                    .map(|account| account.balance())
                    .unwrap_or_default();
                writeln!(out, "Available balance: ${:.2}", balance)?;
                writeln!(out, "Quick amounts:")?;
                for (i, amount) in atm.config().quick_amounts.iter().enumerate() {
                    let note = if Decimal::from(*amount) > balance {
                        " (unavailable)"
                    } else {
                        ""
                    };
                    writeln!(out, " #{}) ${}{}", i + 1, amount, note)?;
                }
                writeln!(out, "Enter an amount, #N for a quick amount, or 0 to cancel.")?;
            }
            Screen::PinChange => {
                writeln!(out, "Enter a new 4-digit PIN, or 0 to cancel.")?;
            }
            Screen::TransactionHistory => {
                let history = atm.history(session)?;
                if history.is_empty() {
                    writeln!(out, "No transactions found.")?;
                }
                for transaction in history.iter().take(atm.config().history_limit) {
                    writeln!(out, "{}", statement::describe(transaction))?;
                }
                writeln!(out, "Press Enter to return to the menu.")?;
            }
        }
        Ok(())
    }

    fn invalid(&mut self) -> Result<Option<Vec<Action>>> {
        writeln!(self.output, "Invalid option.")?;
        Ok(Some(Vec::new()))
    }

    /// read_actions returns None when the user quits
    fn read_actions(&mut self, atm: &Atm, session: &Session) -> Result<Option<Vec<Action>>> {
        let line = match self.prompt("> ")? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.eq_ignore_ascii_case(QUIT) {
            return Ok(None);
        }
        let actions = match session.screen() {
            Screen::Welcome => match line.as_str() {
                "1" => vec![Action::InsertCard],
                "2" => vec![Action::OpenAccount],
                _ => return self.invalid(),
            },
            Screen::CreateAccount => match line.as_str() {
                "1" => {
                    let holder_name = match self.prompt("Full name: ")? {
                        Some(name) => name,
                        None => return Ok(None),
                    };
                    let pin = match self.prompt("Create a 4-digit PIN: ")? {
                        Some(pin) => pin,
                        None => return Ok(None),
                    };
                    vec![Action::CreateAccount { holder_name, pin }]
                }
                BACK => vec![Action::Back],
                _ => return self.invalid(),
            },
            Screen::InsertCard => match line.as_str() {
                BACK => vec![Action::Back],
                _ => vec![Action::EnterCardNumber(line), Action::Continue],
            },
            Screen::EnterPin => match line.as_str() {
                BACK => vec![Action::Back],
                _ => vec![Action::EnterPin(line), Action::Login],
            },
            Screen::MainMenu => match line.as_str() {
                "1" => vec![Action::ShowBalance],
                "2" => vec![Action::StartWithdrawal],
                "3" => vec![Action::StartPinChange],
                "4" => vec![Action::ShowHistory],
                "5" => vec![Action::Logout],
                _ => return self.invalid(),
            },
            Screen::BalanceInquiry | Screen::TransactionHistory => vec![Action::Back],
            Screen::CashWithdrawal => match line.as_str() {
                BACK => vec![Action::Back],
                _ => match line.strip_prefix('#') {
                    Some(index) => {
                        let quick = index
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .and_then(|i| atm.config().quick_amounts.get(i).copied());
                        match quick {
                            Some(amount) => vec![Action::QuickAmount(amount), Action::Withdraw],
                            None => return self.invalid(),
                        }
                    }
                    None => vec![Action::EnterAmount(line), Action::Withdraw],
                },
            },
            Screen::PinChange => match line.as_str() {
                BACK => vec![Action::Back],
                _ => {
                    let confirm = match self.prompt("Confirm new PIN: ")? {
                        Some(confirm) => confirm,
                        None => return Ok(None),
                    };
                    vec![
                        Action::EnterNewPin(line),
                        Action::EnterConfirmPin(confirm),
                        Action::ChangePin,
                    ]
                }
            },
        };
        Ok(Some(actions))
    }
}
