use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, settings_path, shellexpand_path};

pub fn run(api_url: Option<String>, token: Option<String>, export_dir: Option<String>) -> Result<()> {
    let existed = settings_file_exists();
    let mut settings = load_settings();

    if let Some(url) = api_url {
        settings.api_base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(token) = token {
        settings.api_token = Some(token.trim().to_string()).filter(|t| !t.is_empty());
    }
    if let Some(dir) = export_dir {
        settings.export_dir = shellexpand_path(dir.trim());
    }
    std::fs::create_dir_all(settings.export_path())?;
    save_settings(&settings)?;

    let verb = if existed { "Updated" } else { "Wrote" };
    println!("{verb} {}", settings_path().display());
    println!("API:         {}", settings.api_base_url);
    println!("Token:       {}", if settings.api_token.is_some() { "set" } else { "(not set)" });
    println!("Export dir:  {}", settings.export_dir);
    Ok(())
}
