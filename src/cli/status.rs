use colored::Colorize;

use crate::cli::Context;
use crate::error::Result;
use crate::settings::{settings_file_exists, settings_path};

pub async fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let config = if settings_file_exists() {
        settings_path().display().to_string()
    } else {
        format!("{} (not found, using defaults)", settings_path().display())
    };
    println!("Settings:    {config}");
    println!("API:         {}", ctx.api.base_url());
    println!("Token:       {}", if settings.api_token.is_some() { "set" } else { "(not set)" });
    println!("Export dir:  {}", settings.export_path().display());
    println!();

    match ctx.api.list_clients().await {
        Ok(clients) => {
            let online = clients.iter().filter(|c| c.is_online()).count();
            let desktop = clients.iter().filter(|c| c.is_desktop()).count();
            println!("Backend:     {}", "reachable".green());
            println!("Clients:     {} ({online} online, {desktop} desktop)", clients.len());
        }
        Err(e) => {
            println!("Backend:     {}", "unreachable".red());
            println!("             {e}");
        }
    }
    Ok(())
}
