//! QuickBooks Online connection management: app keys, OAuth status, and the
//! bank/credit-card register each upload is posted against.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::{lenient_string, required_lenient_string, Client};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QboKeys {
    pub qb_client_id: String,
    pub qb_client_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QboStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default, alias = "realmId", deserialize_with = "lenient_string")]
    pub realm_id: Option<String>,
    #[serde(default, alias = "tokenExpiresAt")]
    pub token_expires_at: Option<String>,
    #[serde(default, alias = "hasAccessToken")]
    pub has_access_token: bool,
    #[serde(default, alias = "hasRefreshToken")]
    pub has_refresh_token: bool,
}

impl QboStatus {
    pub fn summary(&self) -> &'static str {
        match (self.connected, self.has_refresh_token) {
            (true, _) => "connected",
            (false, true) => "token expired (reconnect)",
            (false, false) => "not connected",
        }
    }
}

/// A bank or credit-card account transactions can be registered against.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAccount {
    #[serde(alias = "Id", deserialize_with = "required_lenient_string")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, rename = "type", alias = "AccountType")]
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisterSelection {
    pub qbo_register_account_id: String,
    pub qbo_register_account_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
    Both,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            "both" | "all" => Some(TokenType::Both),
            _ => None,
        }
    }
}

fn require_online(client: &Client) -> Result<()> {
    if !client.is_online() {
        return Err(BookdeskError::Validation(format!(
            "'{}' is not a QuickBooks Online client",
            client.name
        )));
    }
    Ok(())
}

pub async fn save_keys(api: &ApiClient, client: &Client, id: &str, secret: &str) -> Result<()> {
    require_online(client)?;
    let keys = QboKeys {
        qb_client_id: id.trim().to_string(),
        qb_client_secret: secret.trim().to_string(),
    };
    if keys.qb_client_id.is_empty() || keys.qb_client_secret.is_empty() {
        return Err(BookdeskError::Validation(
            "Both a QuickBooks client id and secret are required".to_string(),
        ));
    }
    api.qbo_save_keys(&client.id, &keys).await?;
    info!(client = %client.id, "QuickBooks keys saved");
    Ok(())
}

pub async fn status(api: &ApiClient, client: &Client) -> Result<QboStatus> {
    require_online(client)?;
    api.qbo_status(&client.id).await
}

/// The OAuth flow runs in a browser against the backend, so all we hand out
/// is the URL that starts it.
pub fn connect_url(api: &ApiClient, client: &Client) -> Result<String> {
    require_online(client)?;
    Ok(api.qbo_connect_url(&client.id))
}

pub async fn disconnect(api: &ApiClient, client: &Client, token_type: TokenType) -> Result<()> {
    require_online(client)?;
    api.qbo_disconnect(&client.id, token_type.as_str()).await?;
    info!(client = %client.id, tokens = token_type.as_str(), "QuickBooks tokens revoked");
    Ok(())
}

pub async fn register_accounts(api: &ApiClient, client: &Client) -> Result<Vec<RegisterAccount>> {
    require_online(client)?;
    api.qbo_register_accounts(&client.id).await
}

/// Point an upload at a register, chosen by id or case-insensitive name.
pub async fn set_register(
    api: &ApiClient,
    client: &Client,
    upload_id: &str,
    register: &str,
) -> Result<RegisterAccount> {
    let accounts = register_accounts(api, client).await?;
    let wanted = register.trim();
    let account = accounts
        .into_iter()
        .find(|a| a.id == wanted || a.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| {
            BookdeskError::Validation(format!("No bank or credit card account named '{wanted}'"))
        })?;
    let selection = RegisterSelection {
        qbo_register_account_id: account.id.clone(),
        qbo_register_account_type: account
            .account_type
            .clone()
            .unwrap_or_else(|| "Bank".to_string()),
    };
    api.qbo_set_register(&client.id, upload_id, &selection).await?;
    info!(client = %client.id, upload = upload_id, register = %account.name, "register set");
    Ok(account)
}
