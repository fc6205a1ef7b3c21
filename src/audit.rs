//! Audit log browsing, CSV export and upload rollback.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::LogEntry;

pub const CSV_HEADER: [&str; 6] = ["Timestamp", "User", "Action", "Target Type", "Target ID", "Details"];

/// Query filters for GET `/logs`. Unset fields are left off the query string.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LogFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl LogFilter {
    pub fn new(user: Option<String>, date: Option<String>, action: Option<String>) -> Result<Self> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let date = clean(date);
        if let Some(d) = &date {
            NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
                BookdeskError::Validation(format!("Invalid date '{d}', expected YYYY-MM-DD"))
            })?;
        }
        Ok(Self {
            user: clean(user),
            date,
            action: clean(action),
        })
    }
}

pub fn default_csv_name(today: NaiveDate) -> String {
    format!("audit_logs_{}.csv", today.format("%Y-%m-%d"))
}

pub fn write_csv<W: std::io::Write>(entries: &[LogEntry], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for e in entries {
        writer.write_record([
            e.timestamp.as_str(),
            e.user_display().as_str(),
            e.action_type.as_str(),
            e.target_type.as_str(),
            e.target_id.as_deref().unwrap_or(""),
            e.details.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn export_csv(
    api: &ApiClient,
    filter: &LogFilter,
    output: Option<PathBuf>,
    export_dir: &Path,
) -> Result<(PathBuf, usize)> {
    let entries = api.list_logs(filter).await?;
    let path = output.unwrap_or_else(|| {
        export_dir.join(default_csv_name(chrono::Local::now().date_naive()))
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_csv(&entries, std::fs::File::create(&path)?)?;
    info!(path = %path.display(), entries = entries.len(), "audit log exported");
    Ok((path, entries.len()))
}

pub async fn rollback(api: &ApiClient, upload_id: &str) -> Result<String> {
    let upload_id = upload_id.trim();
    if upload_id.is_empty() {
        return Err(BookdeskError::Validation("An upload id is required".to_string()));
    }
    let reply = api.rollback_upload(upload_id).await?;
    info!(upload = upload_id, "upload rolled back");
    Ok(reply
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Upload {upload_id} rolled back")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entries() -> Vec<LogEntry> {
        serde_json::from_value(json!([
            {"_id": "l1", "user_id": {"_id": "u1", "name": "Dana"}, "action_type": "approve",
             "target_type": "transaction", "target_id": "T1", "timestamp": "2025-02-01T10:00:00Z",
             "details": "approved, with comma"},
            {"_id": "l2", "user_id": "sam@example.com", "action_type": "upload",
             "target_type": "upload", "target_id": 42, "timestamp": "2025-02-01T11:00:00Z"},
            {"_id": "l3", "action_type": "login", "timestamp": "2025-02-02T08:00:00Z"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_csv_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&entries(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,User,Action,Target Type,Target ID,Details");
        assert_eq!(lines[1], "2025-02-01T10:00:00Z,Dana,approve,transaction,T1,\"approved, with comma\"");
        assert_eq!(lines[2], "2025-02-01T11:00:00Z,sam@example.com,upload,upload,42,");
        assert_eq!(lines[3], "2025-02-02T08:00:00Z,-,login,,,");
    }

    #[test]
    fn test_default_name() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(default_csv_name(day), "audit_logs_2025-03-09.csv");
    }

    #[test]
    fn test_filter_validation() {
        let f = LogFilter::new(Some(" dana ".into()), Some("".into()), None).unwrap();
        assert_eq!(f.user.as_deref(), Some("dana"));
        assert_eq!(f.date, None);
        assert!(LogFilter::new(None, Some("02/01/2025".into()), None).is_err());
    }

    #[tokio::test]
    async fn test_export_applies_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs"))
            .and(query_param("action", "approve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();
        let filter = LogFilter::new(None, None, Some("approve".into())).unwrap();

        let (path, count) = export_csv(&api, &filter, None, dir.path()).await.unwrap();
        assert_eq!(count, 0);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("audit_logs_"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADER.join(","));
    }

    #[tokio::test]
    async fn test_rollback_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rollback/u5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Rolled back 12 transactions"})))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        assert_eq!(rollback(&api, "u5").await.unwrap(), "Rolled back 12 transactions");
    }
}
