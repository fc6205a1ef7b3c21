use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::{BookdeskError, Result};
use crate::exporter::{
    export_iif, push_online, validate_register_account, ExportMethod, PushOutcome, PushReport,
    PushScope,
};
use crate::fmt::{money, truncate};
use crate::settings::shellexpand_path;

pub async fn run(
    ctx: &Context,
    query: &str,
    register_account: Option<String>,
    upload: Option<String>,
    output_dir: Option<String>,
) -> Result<()> {
    if let Some(name) = &register_account {
        validate_register_account(name)?;
    }
    let client = ctx.client(query).await?;
    let method = ExportMethod::for_client(&client)?;
    check_options(method, register_account.as_deref(), upload.as_deref())?;

    match method {
        ExportMethod::QboPush => {
            let transactions = ctx.api.client_transactions(&client.id).await?;
            let scope = match upload {
                Some(id) => PushScope::Upload(id),
                None => PushScope::Approved,
            };
            let report = push_online(&ctx.api, &client, &transactions, scope).await?;
            print_push_report(&client.name, &report);
        }
        ExportMethod::IifFile => {
            let register = register_account.ok_or_else(|| {
                BookdeskError::Validation(
                    "Register account name is required for QuickBooks Desktop export (--register-account)"
                        .to_string(),
                )
            })?;
            let out_dir = output_dir
                .map(|d| std::path::PathBuf::from(shellexpand_path(&d)))
                .unwrap_or_else(|| ctx.settings.export_path());
            let transactions = ctx.api.client_transactions(&client.id).await?;
            let export = export_iif(&ctx.api, &client, &transactions, &register, &out_dir).await?;
            println!(
                "Exported {} approved transactions for {} to {} ({} bytes)",
                export.transaction_count,
                client.name,
                export.path.display(),
                export.bytes
            );
        }
    }
    Ok(())
}

/// Each export method has its own options; the other method's are rejected.
fn check_options(method: ExportMethod, register_account: Option<&str>, upload: Option<&str>) -> Result<()> {
    match method {
        ExportMethod::QboPush if register_account.is_some() => Err(BookdeskError::Validation(
            "--register-account is only used for QuickBooks Desktop IIF export".to_string(),
        )),
        ExportMethod::IifFile if upload.is_some() => Err(BookdeskError::Validation(
            "--upload is only used for QuickBooks Online push".to_string(),
        )),
        _ => Ok(()),
    }
}

fn print_push_report(client_name: &str, report: &PushReport) {
    if !report.lines.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Date", "Vendor", "Amount", "Result"]);
        for line in &report.lines {
            let result = match &line.outcome {
                Some(o @ PushOutcome::Pushed { .. }) => o.to_string().green().to_string(),
                Some(o @ PushOutcome::AlreadyPushed { .. }) => o.to_string().dimmed().to_string(),
                Some(o @ PushOutcome::Failed { .. }) => o.to_string().red().to_string(),
                None => "no result".yellow().to_string(),
            };
            let (date, vendor, amount) = match &line.transaction {
                Some(t) => (
                    t.date_display().to_string(),
                    truncate(&t.vendor_name, 28),
                    money(t.amount),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            table.add_row(vec![
                Cell::new(&line.id),
                Cell::new(date),
                Cell::new(vendor),
                Cell::new(amount),
                Cell::new(result),
            ]);
        }
        println!("QuickBooks push for {client_name}\n{table}");
    }

    let pushed = report.count(|o| matches!(o, PushOutcome::Pushed { .. }));
    let skipped = report.count(|o| matches!(o, PushOutcome::AlreadyPushed { .. }));
    let failed = report.count(|o| matches!(o, PushOutcome::Failed { .. }));
    println!("{pushed} pushed, {skipped} already pushed, {failed} failed");
    if let Some(queued) = report.queued {
        println!("{queued} transactions queued by the backend");
    }
    if let Some(message) = &report.message {
        println!("{message}");
    }
}
