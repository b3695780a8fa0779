use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod accounts;
mod atm;
mod config;
mod screen;
mod session;
mod statement;
mod storage;
mod terminal;
mod transactions;

use accounts::StoredRepo as AccountsStoredRepo;
use atm::Atm;
use config::Config;
use screen::{Action, Alert, Screen};
use session::Session;
use storage::{FileStorage, MemoryStorage, Storage};
use terminal::Terminal;
use transactions::StoredRepo as TransactionsStoredRepo;

#[derive(Parser)]
#[command(version, about = "A simulated ATM backed by local storage")]
struct Opts {
    /// Directory holding the account and transaction files
    #[arg(long, env = "ATM_DATA_DIR", default_value = ".atm", global = true)]
    data_dir: PathBuf,
    /// Keep everything in memory, nothing survives the process
    #[arg(long, global = true)]
    in_memory: bool,
    /// JSON file overriding the default settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct Credentials {
    /// 16-digit card number
    #[arg(long)]
    card: String,
    /// 4-digit PIN
    #[arg(long)]
    pin: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive ATM (default)
    Interactive,
    /// Open a new account
    Open {
        #[arg(long)]
        name: String,
        #[arg(long)]
        pin: String,
    },
    /// Show the balance
    Balance {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Withdraw cash
    Withdraw {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        amount: String,
    },
    /// Change the PIN
    ChangePin {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        new_pin: String,
        #[arg(long)]
        confirm_pin: String,
    },
    /// Print the most recent transactions
    History {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write the full transaction history as CSV to stdout
    Statement {
        #[command(flatten)]
        credentials: Credentials,
    },
}

/// perform runs actions through the router like the terminal does, turning a
/// failure alert into an error
fn perform(atm: &Atm, session: &mut Session, actions: Vec<Action>) -> Result<Option<Alert>> {
    for action in actions {
        if let Some(alert) = screen::dispatch(atm, session, action)? {
            if alert.is_failure() {
                bail!("{}", alert);
            }
            return Ok(Some(alert));
        }
    }
    Ok(None)
}

fn log_in(atm: &Atm, credentials: Credentials) -> Result<Session> {
    let mut session = Session::new();
    perform(
        atm,
        &mut session,
        vec![
            Action::InsertCard,
            Action::EnterCardNumber(credentials.card),
            Action::Continue,
            Action::EnterPin(credentials.pin),
            Action::Login,
        ],
    )?;
    if session.screen() != Screen::MainMenu {
        bail!("login did not complete");
    }
    Ok(session)
}

fn print_alert(alert: Option<Alert>) {
    if let Some(alert) = alert {
        println!("{}", alert);
    }
}

fn execute(atm: &Atm, command: Command) -> Result<()> {
    match command {
        Command::Interactive => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut session = Session::new();
            Terminal::new(stdin.lock(), stdout.lock()).run(atm, &mut session)?;
        }
        Command::Open { name, pin } => {
            let mut session = Session::new();
            let alert = perform(
                atm,
                &mut session,
                vec![
                    Action::OpenAccount,
                    Action::CreateAccount {
                        holder_name: name,
                        pin,
                    },
                ],
            )?;
            print_alert(alert);
        }
        Command::Balance { credentials } => {
            let session = log_in(atm, credentials)?;
            if let Some(account) = session.account() {
                println!("Available balance: ${:.2}", account.balance());
            }
        }
        Command::Withdraw {
            credentials,
            amount,
        } => {
            let mut session = log_in(atm, credentials)?;
            let alert = perform(
                atm,
                &mut session,
                vec![
                    Action::StartWithdrawal,
                    Action::EnterAmount(amount),
                    Action::Withdraw,
                ],
            )?;
            print_alert(alert);
            if let Some(account) = session.account() {
                println!("Available balance: ${:.2}", account.balance());
            }
        }
        Command::ChangePin {
            credentials,
            new_pin,
            confirm_pin,
        } => {
            let mut session = log_in(atm, credentials)?;
            let alert = perform(
                atm,
                &mut session,
                vec![
                    Action::StartPinChange,
                    Action::EnterNewPin(new_pin),
                    Action::EnterConfirmPin(confirm_pin),
                    Action::ChangePin,
                ],
            )?;
            print_alert(alert);
        }
        Command::History { credentials, limit } => {
            let session = log_in(atm, credentials)?;
            let limit = limit.unwrap_or(atm.config().history_limit);
            let history = atm.history(&session)?;
            if history.is_empty() {
                println!("No transactions found.");
            }
            for transaction in history.iter().take(limit) {
                println!("{}", statement::describe(transaction));
            }
        }
        Command::Statement { credentials } => {
            let session = log_in(atm, credentials)?;
            statement::write_statement(io::stdout(), &atm.history(&session)?)?;
        }
    }
    Ok(())
}

fn run() -> Result<()> {
    let opts: Opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    debug!(config = ?config, "Loaded configuration");

    // Any Storage implementation can back the repositories, the file store is
    // just the one with the least setup.
    let storage: Box<dyn Storage> = if opts.in_memory {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(FileStorage::open(&opts.data_dir)?)
    };
    let accounts_repo = AccountsStoredRepo::new(storage.as_ref());
    let transactions_repo = TransactionsStoredRepo::new(storage.as_ref());
    let atm = Atm::new(&accounts_repo, &transactions_repo, config);

    execute(&atm, opts.command.unwrap_or(Command::Interactive))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        error!(error = e.to_string(), "Something went wrong");
        process::exit(1);
    }
}
