pub mod categories;
pub mod clients;
pub mod export;
pub mod init;
pub mod logs;
pub mod qbo;
pub mod review;
pub mod rules;
pub mod rules_manager;
pub mod status;
pub mod transactions;
pub mod uploads;

use std::io::Write;

use clap::{Parser, Subcommand};

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::Client;
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "bookdesk",
    version,
    about = "Review, categorize and export client bookkeeping transactions."
)]
pub struct Cli {
    /// Log API requests and other debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the settings file (API URL, token, export directory).
    Init {
        /// Backend base URL (default: http://localhost:4000)
        #[arg(long = "api-url")]
        api_url: Option<String>,
        /// Bearer token sent with every request
        #[arg(long)]
        token: Option<String>,
        /// Where IIF files and audit CSVs are written
        #[arg(long = "export-dir")]
        export_dir: Option<String>,
    },
    /// Show settings and check the backend is reachable.
    Status,
    /// Manage clients.
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// QuickBooks Online connection for a client.
    Qbo {
        #[command(subcommand)]
        command: QboCommands,
    },
    /// List the categories available to a client.
    Categories {
        /// Client id, name or number
        client: String,
    },
    /// List, categorize and approve transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Interactively review a client's transactions.
    Review {
        /// Client id, name or number
        client: String,
        /// Include transactions that are already approved
        #[arg(long)]
        all: bool,
    },
    /// Manage vendor rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Upload statements and browse uploads.
    Uploads {
        #[command(subcommand)]
        command: UploadsCommands,
    },
    /// Chart of accounts for QuickBooks Desktop clients.
    Coa {
        #[command(subcommand)]
        command: CoaCommands,
    },
    /// Export approved transactions (QuickBooks Online push or Desktop IIF file).
    Export {
        /// Client id, name or number
        client: String,
        /// Register account name for the IIF file (Desktop clients only)
        #[arg(long = "register-account")]
        register_account: Option<String>,
        /// Push every approved transaction of this upload (Online clients only)
        #[arg(long)]
        upload: Option<String>,
        /// Directory for the IIF file (default: export_dir setting)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Browse and export the audit log.
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    /// List all clients.
    List,
    /// Add a client.
    Add {
        /// Client name
        name: String,
        /// QuickBooks flavor: online or desktop
        #[arg(long = "type")]
        account_type: String,
        /// Client number
        #[arg(long)]
        number: Option<i64>,
    },
    /// Update a client's name or number.
    Update {
        /// Client id, name or number
        client: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        number: Option<i64>,
        /// Not allowed; the QuickBooks flavor is fixed once a client exists
        #[arg(long = "type", hide = true)]
        account_type: Option<String>,
    },
    /// Delete a client.
    Delete {
        /// Client id, name or number
        client: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum QboCommands {
    /// Save the QuickBooks app keys for a client.
    Keys {
        client: String,
        #[arg(long = "client-id")]
        qb_client_id: String,
        #[arg(long = "client-secret")]
        qb_client_secret: String,
    },
    /// Show the connection status.
    Status { client: String },
    /// Print the URL that starts the QuickBooks authorization flow.
    Connect { client: String },
    /// Revoke stored tokens: access, refresh or both.
    Disconnect {
        client: String,
        #[arg(long, default_value = "both")]
        tokens: String,
    },
    /// List bank and credit card registers.
    Registers { client: String },
    /// Choose the register an upload is posted against.
    SetRegister {
        client: String,
        /// Upload id
        upload: String,
        /// Register account id or name
        register: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List a client's transactions.
    List {
        client: String,
        /// Only transactions not yet approved
        #[arg(long)]
        pending: bool,
        /// Only transactions of this upload
        #[arg(long)]
        upload: Option<String>,
    },
    /// Set a transaction's category (must be one of the client's categories).
    Categorize {
        client: String,
        /// Transaction id
        transaction: String,
        /// Category label as shown by `bookdesk categories`
        category: String,
        /// Create a vendor rule without asking
        #[arg(long = "create-rule", conflicts_with = "no_rule")]
        create_rule: bool,
        /// Don't offer a vendor rule
        #[arg(long = "no-rule")]
        no_rule: bool,
    },
    /// Toggle a transaction's approval.
    Approve {
        client: String,
        /// Transaction id
        transaction: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List a client's rules.
    List {
        client: String,
        /// Filter by vendor pattern or account
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a rule.
    Add {
        client: String,
        /// Text the vendor name must contain
        vendor: String,
        /// Account to map matching transactions to
        #[arg(long)]
        account: String,
    },
    /// Update a rule's vendor pattern or account.
    Update {
        client: String,
        /// Rule id
        rule: String,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
    /// Enable or disable a rule.
    Toggle { client: String, rule: String },
    /// Delete a rule.
    Delete { client: String, rule: String },
    /// Interactive rules manager.
    Manage { client: String },
}

#[derive(Subcommand)]
pub enum UploadsCommands {
    /// List uploads.
    List,
    /// Upload a PDF or CSV statement.
    Add {
        /// Statement file
        file: String,
        /// Client id, name or number (default: detected from the filename)
        #[arg(long)]
        client: Option<String>,
    },
    /// List the transactions parsed from an upload.
    Transactions {
        /// Upload id
        upload: String,
    },
}

#[derive(Subcommand)]
pub enum CoaCommands {
    /// Upload a chart of accounts CSV exported from QuickBooks Desktop.
    Upload {
        client: String,
        file: String,
        /// Skip the preview confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// List audit log entries.
    List {
        #[arg(long)]
        user: Option<String>,
        /// Date: YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        action: Option<String>,
    },
    /// Export audit log entries to CSV.
    Export {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        action: Option<String>,
        /// Output path (default: <export_dir>/audit_logs_YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Roll back an upload and its transactions.
    Rollback {
        /// Upload id
        upload: String,
        #[arg(long)]
        yes: bool,
    },
}

/// Settings plus the API client built from them, handed to every command.
pub struct Context {
    pub settings: Settings,
    pub api: ApiClient,
}

impl Context {
    pub fn new(settings: Settings) -> Result<Self> {
        let api = ApiClient::new(&settings)?;
        Ok(Self { settings, api })
    }

    pub async fn client(&self, query: &str) -> Result<Client> {
        let clients = self.api.list_clients().await?;
        find_client(&clients, query)
            .cloned()
            .ok_or_else(|| BookdeskError::UnknownClient(query.to_string()))
    }
}

/// Match by id, then client number, then case-insensitive name.
pub fn find_client<'a>(clients: &'a [Client], query: &str) -> Option<&'a Client> {
    let query = query.trim();
    if let Some(c) = clients.iter().find(|c| c.id == query) {
        return Some(c);
    }
    if let Ok(number) = query.parse::<i64>() {
        if let Some(c) = clients.iter().find(|c| c.client_number == Some(number)) {
            return Some(c);
        }
    }
    clients.iter().find(|c| c.name.eq_ignore_ascii_case(query))
}

/// Ask a yes/no question on stdin. Anything but y/yes is a no.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
