use comfy_table::{Cell, Table};

use crate::categories::{resolve, EmptyAction};
use crate::cli::Context;
use crate::error::Result;

pub async fn run(ctx: &Context, query: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let resolution = resolve(&ctx.api, &client).await;
    let list = &resolution.categories;

    if let Some(problem) = &resolution.problem {
        eprintln!("{problem}");
    }
    if let Some(action) = resolution.empty_action() {
        match action {
            EmptyAction::UploadCoa { .. } => println!(
                "No categories for {}. Upload a chart of accounts: `bookdesk coa upload \"{}\" <file.csv>`",
                client.name, client.name
            ),
            EmptyAction::Skip => println!(
                "No categories for {}. Check the QuickBooks connection with `bookdesk qbo status \"{}\"`.",
                client.name, client.name
            ),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Number", "Type", "Detail Type", "Balance"]);
    for e in &list.entries {
        table.add_row(vec![
            Cell::new(&e.display_text),
            Cell::new(e.number.as_deref().unwrap_or("")),
            Cell::new(e.account_type.as_deref().unwrap_or("")),
            Cell::new(e.detail_type.as_deref().unwrap_or("")),
            Cell::new(e.balance.as_deref().unwrap_or("")),
        ]);
    }
    println!("{} categories for {} ({})\n{table}", list.len(), client.name, list.source.label());
    Ok(())
}
