use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::{BookdeskError, Result};
use crate::fmt::{timestamp, yes_no};
use crate::quickbooks::{self, TokenType};

pub async fn keys(ctx: &Context, query: &str, id: &str, secret: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    quickbooks::save_keys(&ctx.api, &client, id, secret).await?;
    println!("Saved QuickBooks keys for {}.", client.name);
    println!("Next: `bookdesk qbo connect {}`", client.name);
    Ok(())
}

pub async fn status(ctx: &Context, query: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let status = quickbooks::status(&ctx.api, &client).await?;
    let summary = if status.connected {
        status.summary().green()
    } else {
        status.summary().yellow()
    };
    println!("{}: {summary}", client.name);
    println!("  Realm ID:       {}", status.realm_id.as_deref().unwrap_or("-"));
    println!("  Access token:   {}", yes_no(status.has_access_token));
    println!("  Refresh token:  {}", yes_no(status.has_refresh_token));
    if let Some(expires) = &status.token_expires_at {
        println!("  Expires:        {}", timestamp(expires));
    }
    Ok(())
}

pub async fn connect(ctx: &Context, query: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let url = quickbooks::connect_url(&ctx.api, &client)?;
    println!("Open this URL in a browser to authorize {}:", client.name);
    println!("{url}");
    Ok(())
}

pub async fn disconnect(ctx: &Context, query: &str, tokens: &str) -> Result<()> {
    let token_type = TokenType::parse(tokens).ok_or_else(|| {
        BookdeskError::Validation(format!("Unknown token type '{tokens}' (access, refresh or both)"))
    })?;
    let client = ctx.client(query).await?;
    quickbooks::disconnect(&ctx.api, &client, token_type).await?;
    println!("Revoked {} token(s) for {}.", token_type.as_str(), client.name);
    Ok(())
}

pub async fn registers(ctx: &Context, query: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let accounts = quickbooks::register_accounts(&ctx.api, &client).await?;
    if accounts.is_empty() {
        println!("No bank or credit card accounts in QuickBooks for {}.", client.name);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type"]);
    for a in accounts {
        table.add_row(vec![
            Cell::new(&a.id),
            Cell::new(&a.name),
            Cell::new(a.account_type.as_deref().unwrap_or("")),
        ]);
    }
    println!("Registers for {}\n{table}", client.name);
    Ok(())
}

pub async fn set_register(ctx: &Context, query: &str, upload: &str, register: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let account = quickbooks::set_register(&ctx.api, &client, upload, register).await?;
    println!("Upload {upload} will post to {} ({}).", account.name, account.id);
    Ok(())
}
