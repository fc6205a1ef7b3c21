//! Wire types for the bookkeeping backend.
//!
//! The backend has served several response shapes over time (legacy and
//! unified endpoints), so records may carry `_id`, the named id or both, and a
//! few fields accept either a number or a string.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Online,
    Desktop,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AccountType {
    pub fn label(&self) -> &'static str {
        match self {
            AccountType::Online => "QuickBooks Online",
            AccountType::Desktop => "QuickBooks Desktop",
            AccountType::Unknown => "(not set)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "online" | "qbo" => Some(AccountType::Online),
            "desktop" | "qbd" => Some(AccountType::Desktop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub client_number: Option<i64>,
    #[serde(default, alias = "qb_type")]
    pub account_type: AccountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qb_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qb_client_secret: Option<String>,
    #[serde(default, alias = "realmId", skip_serializing_if = "Option::is_none")]
    pub realm_id: Option<String>,
    #[serde(default, alias = "active_coa_id", skip_serializing_if = "Option::is_none")]
    pub coa_version: Option<String>,
}

impl Client {
    pub fn is_online(&self) -> bool {
        self.account_type == AccountType::Online
    }

    pub fn is_desktop(&self) -> bool {
        self.account_type == AccountType::Desktop
    }
}

/// Body for creating or updating a client. `account_type` is only ever sent
/// on creation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qb_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qb_client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub auto_category: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub manual_category: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, alias = "qbo_txn_id", deserialize_with = "lenient_string")]
    pub qb_id: Option<String>,
}

impl Transaction {
    /// Manual category wins over the backend's suggestion.
    pub fn effective_category(&self) -> Option<&str> {
        self.manual_category
            .as_deref()
            .or(self.auto_category.as_deref())
    }

    pub fn is_exported(&self) -> bool {
        self.qb_id.is_some()
    }

    /// Date portion only (`2025-01-15T00:00:00.000Z` -> `2025-01-15`).
    pub fn date_display(&self) -> &str {
        match self.transaction_date.as_deref() {
            Some(d) if !d.is_empty() => d.split('T').next().unwrap_or(d),
            _ => "-",
        }
    }
}

/// PATCH body for a transaction. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct Rule {
    pub rule_id: String,
    #[serde(default)]
    pub client_id: String,
    pub vendor_contains: String,
    pub map_to_account: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub match_count: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRule {
    pub client_id: String,
    pub vendor_contains: String,
    pub map_to_account: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_to_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[serde(alias = "pending")]
    PendingParse,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::PendingParse => "pending parse",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

/// A reference the backend sends either as a bare string or as an embedded
/// record (populated client on uploads, populated user on log entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameRef {
    Text(String),
    Record(RefRecord),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefRecord {
    #[serde(default, rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Display name for a possibly-missing reference: the string itself, or the
/// record's `name`, `client_name`, `email` or id, or `-`.
pub fn ref_display(value: Option<&NameRef>) -> String {
    let resolved = match value {
        Some(NameRef::Text(s)) => Some(s.as_str()),
        Some(NameRef::Record(r)) => r
            .name
            .as_deref()
            .or(r.client_name.as_deref())
            .or(r.email.as_deref())
            .or(r.id.as_deref()),
        None => None,
    };
    match resolved {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => "-".to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct Upload {
    pub upload_id: String,
    #[serde(default)]
    pub client_id: Option<NameRef>,
    #[serde(default)]
    pub client: Option<NameRef>,
    #[serde(default, alias = "filename")]
    pub original_filename: String,
    #[serde(default)]
    pub uploaded_by: Option<NameRef>,
    #[serde(default)]
    pub upload_timestamp: Option<String>,
    pub status: UploadStatus,
}

impl Upload {
    pub fn client_display(&self) -> String {
        ref_display(self.client.as_ref().or(self.client_id.as_ref()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct LogEntry {
    pub log_id: String,
    #[serde(default, alias = "user")]
    pub user_id: Option<NameRef>,
    pub action_type: String,
    #[serde(default)]
    pub target_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub target_id: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl LogEntry {
    pub fn user_display(&self) -> String {
        ref_display(self.user_id.as_ref())
    }
}

/// Account returned by the QuickBooks Online chart-of-accounts endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct QboAccount {
    #[serde(alias = "Id", deserialize_with = "required_lenient_string")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "fullyQualifiedName", alias = "FullyQualifiedName")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, alias = "AcctNum", deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default, rename = "type", alias = "AccountType")]
    pub account_type: Option<String>,
    #[serde(default, rename = "subType", alias = "AccountSubType")]
    pub sub_type: Option<String>,
    #[serde(default = "default_true", alias = "Active")]
    pub active: bool,
}

/// Row of an uploaded QuickBooks Desktop chart of accounts. Column names
/// follow the QBD account list export.
#[derive(Debug, Clone, Deserialize)]
pub struct CoaRow {
    #[serde(default, rename = "_id", alias = "id", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, rename = "Accnt. #", alias = "number", alias = "account_number", deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default, rename = "Account", alias = "name", alias = "account_name")]
    pub name: Option<String>,
    #[serde(default, rename = "Type", alias = "type", alias = "account_type")]
    pub account_type: Option<String>,
    #[serde(default, rename = "Detail Type", alias = "detail_type", alias = "detailType")]
    pub detail_type: Option<String>,
    #[serde(default, rename = "Balance Total", alias = "Balance", alias = "balance", deserialize_with = "lenient_string")]
    pub balance: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoaData {
    #[serde(default)]
    pub data: Vec<CoaRow>,
}

/// Keep `key`, filling it from `fallback` when it is missing or null, and drop
/// `fallback` so the two never collide.
pub(crate) fn merge_id_keys(value: &mut serde_json::Value, key: &str, fallback: &str) {
    if let Some(map) = value.as_object_mut() {
        let other = map.remove(fallback);
        if map.get(key).map_or(true, |v| v.is_null()) {
            if let Some(other) = other {
                map.insert(key.to_string(), other);
            }
        }
    }
}

/// `Deserialize` for a record type derived with `#[serde(remote = "Self")]`:
/// merge its id keys into one, then run the derived impl.
macro_rules! deserialize_record {
    ($ty:ty, $key:literal, $($fallback:literal),+) => {
        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let mut value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
                $($crate::models::merge_id_keys(&mut value, $key, $fallback);)+
                <$ty>::deserialize(value).map_err(serde::de::Error::custom)
            }
        }
    };
}
pub(crate) use deserialize_record;

deserialize_record!(Client, "_id", "client_id", "id");
deserialize_record!(Transaction, "transaction_id", "_id");
deserialize_record!(Rule, "rule_id", "_id");
deserialize_record!(Upload, "upload_id", "_id");
deserialize_record!(LogEntry, "log_id", "_id");

fn non_empty_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Accepts a string or a number; empty strings become `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn required_lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing id"))
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
