use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bank_ledger::cli::{
    handle_account_command, handle_export_command, handle_history_command, handle_lookup_command,
    handle_summary_command, handle_transfer_command, handle_verify_command, AccountCommands,
    HistoryArgs, TransferArgs,
};
use bank_ledger::config::{LedgerPaths, Settings};
use bank_ledger::logging;
use bank_ledger::storage::Storage;

#[derive(Parser)]
#[command(
    name = "ledger",
    version,
    about = "Double-entry ledger for bank account transfers",
    long_about = "Keeps account balances and an append-only transaction journal. \
                  Every transfer debits one account and credits another in a \
                  single atomic commit, writing both linked entries."
)]
struct Cli {
    /// Directory holding config.json and the ledger data
    #[arg(long, global = true, env = "LEDGER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ledger data directory
    Init,

    /// Show current configuration and paths
    Config,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move funds between two accounts
    Transfer(TransferArgs),

    /// Show both entries of a transfer by reference number
    Lookup {
        /// Reference number
        reference: String,
    },

    /// List an account's entries, newest first
    #[command(alias = "txn")]
    History(HistoryArgs),

    /// Income, expenses and per-type totals for an account
    Summary {
        /// Account number or ID
        account: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute balances from the journal and check every transfer pair
    Verify {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the ledger to a file
    Export {
        /// Output file path
        output: PathBuf,
        /// Export the account list as CSV instead of the full ledger as JSON
        #[arg(long)]
        accounts: bool,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => LedgerPaths::with_base_dir(dir),
        None => LedgerPaths::new()?,
    };
    let settings = Settings::load_or_create(&paths)?;
    logging::init(&settings.log_filter, settings.log_format);

    let Some(command) = cli.command else {
        println!("bank-ledger - double-entry ledger for account transfers");
        println!();
        println!("Run 'ledger --help' for usage information.");
        return Ok(());
    };

    let open = || Storage::open_with_timeout(paths.clone(), settings.lock_timeout());

    match command {
        Commands::Init => {
            if paths.is_initialized() {
                println!("Ledger already initialized at: {}", paths.base_dir().display());
                return Ok(());
            }
            println!("Initializing ledger at: {}", paths.base_dir().display());
            open()?;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!("  Operator: {}", settings.operator.as_uuid());
            println!();
            println!("Run 'ledger account open <NUMBER> --balance <AMOUNT>' to add an account.");
        }
        Commands::Config => {
            println!("Ledger Configuration");
            println!("====================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Accounts file:    {}", paths.accounts_file().display());
            println!("Journal file:     {}", paths.journal_file().display());
            println!();
            println!("Settings:");
            println!("  Default currency:  {}", settings.default_currency);
            println!("  Reference prefix:  {}", settings.reference_prefix);
            println!("  Lock timeout:      {} ms", settings.lock_timeout_ms);
            println!("  Log filter:        {}", settings.log_filter);
            println!("  Operator:          {}", settings.operator.as_uuid());
        }
        Commands::Account(cmd) => handle_account_command(&open()?, &settings, cmd)?,
        Commands::Transfer(args) => handle_transfer_command(&open()?, &settings, args)?,
        Commands::Lookup { reference } => {
            handle_lookup_command(&open()?, &settings, &reference)?
        }
        Commands::History(args) => handle_history_command(&open()?, &settings, args)?,
        Commands::Summary { account, json } => handle_summary_command(&open()?, &account, json)?,
        Commands::Verify { json } => handle_verify_command(&open()?, json)?,
        Commands::Export {
            output,
            accounts,
            pretty,
        } => handle_export_command(&open()?, &output, accounts, pretty)?,
    }

    Ok(())
}
