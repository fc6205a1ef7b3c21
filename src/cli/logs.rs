use comfy_table::{Cell, Table};

use crate::audit::{self, LogFilter};
use crate::cli::{confirm, Context};
use crate::error::Result;
use crate::fmt::{timestamp, truncate};
use crate::settings::shellexpand_path;

pub async fn list(
    ctx: &Context,
    user: Option<String>,
    date: Option<String>,
    action: Option<String>,
) -> Result<()> {
    let filter = LogFilter::new(user, date, action)?;
    let entries = ctx.api.list_logs(&filter).await?;
    if entries.is_empty() {
        println!("No log entries.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Time", "User", "Action", "Target", "Details"]);
    for e in &entries {
        let target = match &e.target_id {
            Some(id) => format!("{} {id}", e.target_type),
            None => e.target_type.clone(),
        };
        table.add_row(vec![
            Cell::new(timestamp(&e.timestamp)),
            Cell::new(e.user_display()),
            Cell::new(&e.action_type),
            Cell::new(target),
            Cell::new(truncate(e.details.as_deref().unwrap_or(""), 60)),
        ]);
    }
    println!("Audit log ({} entries)\n{table}", entries.len());
    Ok(())
}

pub async fn export(
    ctx: &Context,
    user: Option<String>,
    date: Option<String>,
    action: Option<String>,
    output: Option<String>,
) -> Result<()> {
    let filter = LogFilter::new(user, date, action)?;
    let output = output.map(|o| std::path::PathBuf::from(shellexpand_path(&o)));
    let (path, count) = audit::export_csv(&ctx.api, &filter, output, &ctx.settings.export_path()).await?;
    println!("Wrote {count} entries to {}", path.display());
    Ok(())
}

pub async fn rollback(ctx: &Context, upload_id: &str, yes: bool) -> Result<()> {
    if !yes
        && !confirm(&format!(
            "Roll back upload {upload_id}? Its transactions will be removed."
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }
    let message = audit::rollback(&ctx.api, upload_id).await?;
    println!("{message}");
    Ok(())
}
