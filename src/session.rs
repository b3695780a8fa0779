use crate::accounts::Account;
use crate::screen::Screen;

pub const CARD_NUMBER_LEN: usize = 16;
pub const PIN_LEN: usize = 4;

/// is_valid_pin is true for exactly four ASCII digits
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LEN && pin.chars().all(|c| c.is_ascii_digit())
}

/// filter_card_number drops whitespace and rejects anything that is not up to 16 digits
fn filter_card_number(input: &str) -> Option<String> {
    let raw: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if raw.len() <= CARD_NUMBER_LEN && raw.chars().all(|c| c.is_ascii_digit()) {
        Some(raw)
    } else {
        None
    }
}

/// filter_pin drops non-digits and rejects anything longer than a PIN
fn filter_pin(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= PIN_LEN {
        Some(digits)
    } else {
        None
    }
}

/// Session is everything the ATM remembers between two actions.
///
/// It lives only in memory. The account is a copy of the stored record and is
/// replaced after every mutating operation. Input setters return false when the
/// input was refused, in which case the buffer keeps its previous value.
#[derive(Debug, Clone, Default)]
pub struct Session {
    screen: Screen,
    account: Option<Account>,
    card_number: String,
    pin: String,
    withdrawal_amount: String,
    new_pin: String,
    confirm_pin: String,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }
    pub fn screen(&self) -> Screen {
        self.screen
    }
    pub fn set_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }
    pub fn set_account(&mut self, account: Account) {
        self.account = Some(account);
    }
    pub fn is_authenticated(&self) -> bool {
        self.account.is_some()
    }

    pub fn card_number(&self) -> &str {
        &self.card_number
    }
    pub fn set_card_number(&mut self, input: &str) -> bool {
        match filter_card_number(input) {
            Some(card_number) => {
                self.card_number = card_number;
                true
            }
            None => false,
        }
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }
    pub fn set_pin(&mut self, input: &str) -> bool {
        set_filtered_pin(&mut self.pin, input)
    }
    pub fn clear_pin(&mut self) {
        self.pin.clear();
    }

    pub fn withdrawal_amount(&self) -> &str {
        &self.withdrawal_amount
    }
    pub fn set_withdrawal_amount(&mut self, input: &str) {
        self.withdrawal_amount = input.trim().to_string();
    }
    pub fn clear_withdrawal_amount(&mut self) {
        self.withdrawal_amount.clear();
    }

    pub fn new_pin(&self) -> &str {
        &self.new_pin
    }
    pub fn set_new_pin(&mut self, input: &str) -> bool {
        set_filtered_pin(&mut self.new_pin, input)
    }
    pub fn confirm_pin(&self) -> &str {
        &self.confirm_pin
    }
    pub fn set_confirm_pin(&mut self, input: &str) -> bool {
        set_filtered_pin(&mut self.confirm_pin, input)
    }
    pub fn clear_pin_change(&mut self) {
        self.new_pin.clear();
        self.confirm_pin.clear();
    }

    /// reset logs out and returns to the welcome screen
    pub fn reset(&mut self) {
        *self = Session::default();
    }
}

fn set_filtered_pin(buffer: &mut String, input: &str) -> bool {
    match filter_pin(input) {
        Some(pin) => {
            *buffer = pin;
            true
        }
        None => false,
    }
}
