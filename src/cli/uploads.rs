use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::transactions::transaction_table;
use crate::cli::{confirm, find_client, Context};
use crate::error::{BookdeskError, Result};
use crate::fmt::timestamp;
use crate::models::{ref_display, Transaction, UploadStatus};
use crate::uploads::{
    detect_client_from_filename, preview_coa, require_desktop, upload_coa, upload_statement, UploadOutcome,
};

pub async fn list(ctx: &Context) -> Result<()> {
    let uploads = ctx.api.list_uploads().await?;
    if uploads.is_empty() {
        println!("No uploads yet.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Client", "File", "Uploaded By", "Uploaded", "Status"]);
    for u in &uploads {
        let status = match u.status {
            UploadStatus::Failed => u.status.label().red().to_string(),
            UploadStatus::Completed => u.status.label().green().to_string(),
            _ => u.status.label().to_string(),
        };
        table.add_row(vec![
            Cell::new(&u.upload_id),
            Cell::new(u.client_display()),
            Cell::new(&u.original_filename),
            Cell::new(ref_display(u.uploaded_by.as_ref())),
            Cell::new(u.upload_timestamp.as_deref().map(timestamp).unwrap_or_default()),
            Cell::new(status),
        ]);
    }
    println!("Uploads\n{table}");
    Ok(())
}

pub async fn add(ctx: &Context, file: &str, query: Option<&str>) -> Result<()> {
    let path = Path::new(file);
    let clients = ctx.api.list_clients().await?;
    let client = match query {
        Some(q) => find_client(&clients, q).ok_or_else(|| BookdeskError::UnknownClient(q.to_string()))?,
        None => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let detected = detect_client_from_filename(&filename, &clients).ok_or_else(|| {
                BookdeskError::Validation(format!(
                    "Could not tell the client from '{filename}'; pass --client"
                ))
            })?;
            println!("Detected client: {}", detected.name);
            detected
        }
    };

    match upload_statement(&ctx.api, path, client).await? {
        UploadOutcome::Parsed {
            upload_id,
            transactions,
        } => {
            println!("Uploaded {file} as {upload_id}: {} transactions", transactions.len());
            let refs: Vec<&Transaction> = transactions.iter().collect();
            if !refs.is_empty() {
                println!("{}", transaction_table(&refs));
            }
        }
        UploadOutcome::AmbiguousClient {
            candidates,
            message,
        } => {
            println!("{message}");
            for c in candidates {
                println!("  {c}");
            }
            println!("Re-run with --client to choose one.");
        }
    }
    Ok(())
}

pub async fn transactions(ctx: &Context, upload_id: &str) -> Result<()> {
    let transactions = ctx.api.upload_transactions(upload_id).await?;
    if transactions.is_empty() {
        println!("No transactions in upload {upload_id}.");
        return Ok(());
    }
    let refs: Vec<&Transaction> = transactions.iter().collect();
    println!("Upload {upload_id}\n{}", transaction_table(&refs));
    Ok(())
}

pub async fn coa(ctx: &Context, query: &str, file: &str, yes: bool) -> Result<()> {
    let client = ctx.client(query).await?;
    require_desktop(&client)?;
    let path = Path::new(file);
    let preview = preview_coa(path)?;

    let mut table = Table::new();
    table.set_header(preview.headers.clone());
    for row in &preview.rows {
        table.add_row(row.clone());
    }
    println!("{table}");
    println!("{} rows (showing {})", preview.total_rows, preview.rows.len());

    if !yes && !confirm(&format!("Upload this chart of accounts for {}?", client.name))? {
        println!("Cancelled.");
        return Ok(());
    }
    upload_coa(&ctx.api, &client, path).await?;
    println!("Uploaded chart of accounts for {}.", client.name);
    Ok(())
}
