use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categories::resolve;
use crate::cli::{confirm, Context};
use crate::error::{BookdeskError, Result};
use crate::fmt::{money, truncate};
use crate::models::Transaction;
use crate::reviewer::{ReviewState, TransactionReview};

pub fn transaction_table(transactions: &[&Transaction]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Vendor", "Amount", "Category", "State", "QBO"]);
    for t in transactions {
        let state = ReviewState::of(t);
        let state_text = match state {
            ReviewState::Approved => state.label().green().to_string(),
            ReviewState::NeedsReview => state.label().yellow().to_string(),
            _ => state.label().to_string(),
        };
        let amount = if t.amount < 0.0 {
            money(t.amount).red().to_string()
        } else {
            money(t.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(&t.transaction_id),
            Cell::new(t.date_display()),
            Cell::new(truncate(&t.vendor_name, 32)),
            Cell::new(amount),
            Cell::new(t.effective_category().unwrap_or("-")),
            Cell::new(state_text),
            Cell::new(t.qb_id.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub async fn list(ctx: &Context, query: &str, pending: bool, upload: Option<&str>) -> Result<()> {
    let client = ctx.client(query).await?;
    let review = TransactionReview::load(&ctx.api, &client).await?;
    let shown: Vec<&Transaction> = review
        .transactions
        .iter()
        .filter(|t| !pending || !t.approved)
        .filter(|t| upload.is_none() || t.upload_id.as_deref() == upload)
        .collect();
    if shown.is_empty() {
        println!("No transactions.");
        return Ok(());
    }
    let counts = review.counts();
    println!("{}\n{}", client.name, transaction_table(&shown));
    println!(
        "{} approved, {} pending, {} pushed",
        counts.approved, counts.pending, counts.pushed
    );
    Ok(())
}

/// `create_rule`: `Some(answer)` from flags, `None` to ask on stdin.
pub async fn categorize(
    ctx: &Context,
    query: &str,
    transaction_id: &str,
    category: &str,
    create_rule: Option<bool>,
) -> Result<()> {
    let client = ctx.client(query).await?;
    let resolution = resolve(&ctx.api, &client).await;
    if let Some(problem) = resolution.problem {
        return Err(BookdeskError::Other(problem.to_string()));
    }
    let categories = resolution.categories;
    let mut review = TransactionReview::load(&ctx.api, &client).await?;

    let offer = review
        .assign_manual_category(&ctx.api, &categories, transaction_id, category)
        .await?;
    println!("Categorized {transaction_id} as {category}.");

    let accept = match create_rule {
        Some(answer) => answer,
        None => confirm(&offer.prompt())?,
    };
    if accept {
        match offer.accept(&ctx.api).await {
            Ok(rule) => println!(
                "Added rule: '{}' \u{2192} {}",
                rule.vendor_contains, rule.map_to_account
            ),
            Err(e) => eprintln!("Rule not created: {}", e.message_or("Failed to create rule")),
        }
    } else {
        offer.decline();
    }
    Ok(())
}

pub async fn approve(ctx: &Context, query: &str, transaction_id: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let mut review = TransactionReview::load(&ctx.api, &client).await?;
    let txn = review.toggle_approval(&ctx.api, transaction_id).await?;
    if txn.approved {
        println!("Approved {transaction_id}.");
    } else {
        println!("Unapproved {transaction_id}.");
    }
    Ok(())
}
