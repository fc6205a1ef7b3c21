use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::timestamp;
use crate::models::RuleUpdate;
use crate::rules::RuleBook;

pub async fn list(ctx: &Context, query: &str, search: Option<&str>) -> Result<()> {
    let client = ctx.client(query).await?;
    let book = RuleBook::load(&ctx.api, &client.id).await?;
    let rules = book.search(search.unwrap_or(""));

    let mut table = Table::new();
    table.set_header(vec!["ID", "Vendor Contains", "Account", "Active", "Matches", "Created"]);
    for r in &rules {
        let active = if r.active { "yes".green() } else { "no".dimmed() };
        table.add_row(vec![
            Cell::new(&r.rule_id),
            Cell::new(&r.vendor_contains),
            Cell::new(&r.map_to_account),
            Cell::new(active),
            Cell::new(r.match_count),
            Cell::new(r.created_at.as_deref().map(timestamp).unwrap_or_default()),
        ]);
    }
    println!("Rules for {} ({} of {})\n{table}", client.name, rules.len(), book.rules.len());
    Ok(())
}

pub async fn add(ctx: &Context, query: &str, vendor: &str, account: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let mut book = RuleBook::load(&ctx.api, &client.id).await?;
    let rule = book.create(&ctx.api, vendor, account).await?;
    println!("Added rule: '{}' \u{2192} {}", rule.vendor_contains, rule.map_to_account);
    Ok(())
}

pub async fn update(
    ctx: &Context,
    query: &str,
    rule_id: &str,
    vendor: Option<String>,
    account: Option<String>,
) -> Result<()> {
    let client = ctx.client(query).await?;
    let mut book = RuleBook::load(&ctx.api, &client.id).await?;
    let update = RuleUpdate {
        vendor_contains: vendor.map(|v| v.trim().to_string()),
        map_to_account: account.map(|a| a.trim().to_string()),
        active: None,
    };
    let rule = book.update(&ctx.api, rule_id, update).await?;
    println!("Updated rule {}: '{}' \u{2192} {}", rule.rule_id, rule.vendor_contains, rule.map_to_account);
    Ok(())
}

pub async fn toggle(ctx: &Context, query: &str, rule_id: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let mut book = RuleBook::load(&ctx.api, &client.id).await?;
    let rule = book.toggle_active(&ctx.api, rule_id).await?;
    let state = if rule.active { "Enabled" } else { "Disabled" };
    println!("{state} rule {}: '{}'", rule.rule_id, rule.vendor_contains);
    Ok(())
}

pub async fn delete(ctx: &Context, query: &str, rule_id: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let mut book = RuleBook::load(&ctx.api, &client.id).await?;
    let pattern = book
        .get(rule_id)
        .map(|r| format!("'{}' \u{2192} {}", r.vendor_contains, r.map_to_account))
        .unwrap_or_default();
    book.delete(&ctx.api, rule_id).await?;
    println!("Deleted rule {rule_id}: {pattern}");
    Ok(())
}
