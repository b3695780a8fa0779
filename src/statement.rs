use std::io;

use anyhow::Result;
use serde::Serialize;

use crate::transactions::{Transaction, TransactionKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// signed_amount renders withdrawals as debits and everything else as credits
fn signed_amount(transaction: &Transaction) -> Option<String> {
    transaction.amount.map(|amount| match transaction.kind {
        TransactionKind::Withdrawal => format!("-{:.2}", amount),
        _ => format!("{:.2}", amount),
    })
}

/// describe renders one history line the way the history screen shows it
pub fn describe(transaction: &Transaction) -> String {
    let when = transaction.timestamp.format(TIMESTAMP_FORMAT);
    match signed_amount(transaction) {
        Some(amount) => {
            let (sign, digits) = match amount.strip_prefix('-') {
                Some(digits) => ("-", digits.to_string()),
                None => ("+", amount),
            };
            format!(
                "{}  {:<28} {}${}",
                when, transaction.description, sign, digits
            )
        }
        None => format!("{}  {}", when, transaction.description),
    }
}

#[derive(Debug, Serialize)]
struct StatementLine<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'a str,
    amount: Option<String>,
    description: &'a str,
}

/// write_statement writes the transactions as CSV, in the order given
pub fn write_statement<W: io::Write>(writer: W, transactions: &[Transaction]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for transaction in transactions {
        writer.serialize(StatementLine {
            timestamp: transaction.timestamp.to_rfc3339(),
            kind: transaction.kind.label(),
            amount: signed_amount(transaction),
            description: &transaction.description,
        })?;
    }
    writer.flush()?;
    Ok(())
}
