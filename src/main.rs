mod api;
mod audit;
mod categories;
mod cli;
mod error;
mod exporter;
mod fmt;
mod models;
mod quickbooks;
mod reviewer;
mod rules;
mod settings;
mod tui;
mod uploads;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{
    Cli, ClientsCommands, CoaCommands, Commands, Context, LogsCommands, QboCommands,
    RulesCommands, TransactionsCommands, UploadsCommands,
};
use error::Result;
use settings::Settings;

fn init_tracing(settings: &Settings, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("bookdesk=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"))
        })
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let command = match cli.command {
        Commands::Init {
            api_url,
            token,
            export_dir,
        } => return cli::init::run(api_url, token, export_dir),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bookdesk", &mut std::io::stdout());
            return Ok(());
        }
        other => other,
    };

    let ctx = Context::new(settings)?;
    match command {
        Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
        Commands::Status => cli::status::run(&ctx).await,
        Commands::Clients { command } => match command {
            ClientsCommands::List => cli::clients::list(&ctx).await,
            ClientsCommands::Add {
                name,
                account_type,
                number,
            } => cli::clients::add(&ctx, &name, &account_type, number).await,
            ClientsCommands::Update {
                client,
                name,
                number,
                account_type,
            } => cli::clients::update(&ctx, &client, name, number, account_type).await,
            ClientsCommands::Delete { client, yes } => cli::clients::delete(&ctx, &client, yes).await,
        },
        Commands::Qbo { command } => match command {
            QboCommands::Keys {
                client,
                qb_client_id,
                qb_client_secret,
            } => cli::qbo::keys(&ctx, &client, &qb_client_id, &qb_client_secret).await,
            QboCommands::Status { client } => cli::qbo::status(&ctx, &client).await,
            QboCommands::Connect { client } => cli::qbo::connect(&ctx, &client).await,
            QboCommands::Disconnect { client, tokens } => {
                cli::qbo::disconnect(&ctx, &client, &tokens).await
            }
            QboCommands::Registers { client } => cli::qbo::registers(&ctx, &client).await,
            QboCommands::SetRegister {
                client,
                upload,
                register,
            } => cli::qbo::set_register(&ctx, &client, &upload, &register).await,
        },
        Commands::Categories { client } => cli::categories::run(&ctx, &client).await,
        Commands::Transactions { command } => match command {
            TransactionsCommands::List {
                client,
                pending,
                upload,
            } => cli::transactions::list(&ctx, &client, pending, upload.as_deref()).await,
            TransactionsCommands::Categorize {
                client,
                transaction,
                category,
                create_rule,
                no_rule,
            } => {
                let answer = match (create_rule, no_rule) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                cli::transactions::categorize(&ctx, &client, &transaction, &category, answer).await
            }
            TransactionsCommands::Approve {
                client,
                transaction,
            } => cli::transactions::approve(&ctx, &client, &transaction).await,
        },
        Commands::Review { client, all } => cli::review::run(&ctx, &client, all).await,
        Commands::Rules { command } => match command {
            RulesCommands::List { client, search } => {
                cli::rules::list(&ctx, &client, search.as_deref()).await
            }
            RulesCommands::Add {
                client,
                vendor,
                account,
            } => cli::rules::add(&ctx, &client, &vendor, &account).await,
            RulesCommands::Update {
                client,
                rule,
                vendor,
                account,
            } => cli::rules::update(&ctx, &client, &rule, vendor, account).await,
            RulesCommands::Toggle { client, rule } => cli::rules::toggle(&ctx, &client, &rule).await,
            RulesCommands::Delete { client, rule } => cli::rules::delete(&ctx, &client, &rule).await,
            RulesCommands::Manage { client } => cli::rules_manager::run(&ctx, &client).await,
        },
        Commands::Uploads { command } => match command {
            UploadsCommands::List => cli::uploads::list(&ctx).await,
            UploadsCommands::Add { file, client } => {
                cli::uploads::add(&ctx, &file, client.as_deref()).await
            }
            UploadsCommands::Transactions { upload } => {
                cli::uploads::transactions(&ctx, &upload).await
            }
        },
        Commands::Coa { command } => match command {
            CoaCommands::Upload { client, file, yes } => {
                cli::uploads::coa(&ctx, &client, &file, yes).await
            }
        },
        Commands::Export {
            client,
            register_account,
            upload,
            output_dir,
        } => cli::export::run(&ctx, &client, register_account, upload, output_dir).await,
        Commands::Logs { command } => match command {
            LogsCommands::List { user, date, action } => {
                cli::logs::list(&ctx, user, date, action).await
            }
            LogsCommands::Export {
                user,
                date,
                action,
                output,
            } => cli::logs::export(&ctx, user, date, action, output).await,
            LogsCommands::Rollback { upload, yes } => cli::logs::rollback(&ctx, &upload, yes).await,
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = settings::load_settings();
    init_tracing(&settings, cli.verbose);

    if let Err(e) = run(cli, settings).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
