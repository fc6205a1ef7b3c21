use comfy_table::{Cell, Table};

use crate::cli::{confirm, Context};
use crate::error::{BookdeskError, Result};
use crate::models::{AccountType, ClientInput};

pub async fn list(ctx: &Context) -> Result<()> {
    let clients = ctx.api.list_clients().await?;
    if clients.is_empty() {
        println!("No clients yet. Add one with `bookdesk clients add`.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Number", "Name", "QuickBooks", "Connected"]);
    for c in clients {
        let connected = if c.is_online() {
            if c.realm_id.is_some() { "yes" } else { "no" }
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(&c.id),
            Cell::new(c.client_number.map(|n| n.to_string()).unwrap_or_default()),
            Cell::new(&c.name),
            Cell::new(c.account_type.label()),
            Cell::new(connected),
        ]);
    }
    println!("Clients\n{table}");
    Ok(())
}

pub async fn add(ctx: &Context, name: &str, account_type: &str, number: Option<i64>) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BookdeskError::Validation("Client name is required".to_string()));
    }
    let account_type = AccountType::parse(account_type).ok_or_else(|| {
        BookdeskError::Validation(format!(
            "Unknown QuickBooks type '{account_type}' (expected online or desktop)"
        ))
    })?;
    let client = ctx
        .api
        .create_client(&ClientInput {
            name: Some(name.to_string()),
            client_number: number,
            account_type: Some(account_type),
            ..Default::default()
        })
        .await?;
    println!("Added client: {} ({}, id {})", client.name, account_type.label(), client.id);
    Ok(())
}

pub async fn update(
    ctx: &Context,
    query: &str,
    name: Option<String>,
    number: Option<i64>,
    account_type: Option<String>,
) -> Result<()> {
    if account_type.is_some() {
        return Err(BookdeskError::Validation(
            "A client's QuickBooks type cannot be changed; create a new client instead".to_string(),
        ));
    }
    let name = name.map(|n| n.trim().to_string());
    if name.as_deref() == Some("") {
        return Err(BookdeskError::Validation("Client name cannot be empty".to_string()));
    }
    if name.is_none() && number.is_none() {
        return Err(BookdeskError::Validation("Nothing to update".to_string()));
    }
    let client = ctx.client(query).await?;
    let updated = ctx
        .api
        .update_client(
            &client.id,
            &ClientInput {
                name,
                client_number: number,
                ..Default::default()
            },
        )
        .await?;
    println!("Updated client: {}", updated.name);
    Ok(())
}

pub async fn delete(ctx: &Context, query: &str, yes: bool) -> Result<()> {
    let client = ctx.client(query).await?;
    if !yes && !confirm(&format!("Delete client '{}'?", client.name))? {
        println!("Cancelled.");
        return Ok(());
    }
    ctx.api.delete_client(&client.id).await?;
    println!("Deleted client: {}", client.name);
    Ok(())
}
