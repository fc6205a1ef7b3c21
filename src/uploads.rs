//! Statement and chart-of-accounts uploads. Parsing happens in the backend;
//! here we only check files before sending them and interpret the reply.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::{deserialize_record, ref_display, Client, NameRef, Transaction};

pub const MAX_STATEMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const COA_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(remote = "Self")]
pub struct UploadResponse {
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default, alias = "clientMatches")]
    pub client_matches: Option<Vec<NameRef>>,
    #[serde(default)]
    pub message: Option<String>,
}

deserialize_record!(UploadResponse, "upload_id", "uploadId", "_id");

#[derive(Debug)]
pub enum UploadOutcome {
    Parsed {
        upload_id: String,
        transactions: Vec<Transaction>,
    },
    /// The backend could not tell which client the statement belongs to.
    AmbiguousClient {
        candidates: Vec<String>,
        message: String,
    },
}

fn extension(file: &Path) -> Option<String> {
    file.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn validate_statement(file: &Path) -> Result<()> {
    match extension(file).as_deref() {
        Some("pdf") | Some("csv") => {}
        _ => {
            return Err(BookdeskError::Validation(format!(
                "{} is not a PDF or CSV statement",
                file.display()
            )))
        }
    }
    let size = std::fs::metadata(file)?.len();
    if size > MAX_STATEMENT_BYTES {
        return Err(BookdeskError::Validation(format!(
            "{} is larger than the 10 MB upload limit",
            file.display()
        )));
    }
    Ok(())
}

/// First client whose first name-word (lowercased) appears in the filename.
pub fn detect_client_from_filename<'a>(filename: &str, clients: &'a [Client]) -> Option<&'a Client> {
    let filename = filename.to_lowercase();
    clients.iter().find(|c| {
        c.name
            .split_whitespace()
            .next()
            .map(|w| w.to_lowercase())
            .is_some_and(|w| !w.is_empty() && filename.contains(&w))
    })
}

pub async fn upload_statement(api: &ApiClient, file: &Path, client: &Client) -> Result<UploadOutcome> {
    validate_statement(file)?;
    let response = api.upload_statement(file, &client.id).await?;
    info!(client = %client.id, file = %file.display(), "statement uploaded");

    if let Some(upload_id) = response.upload_id {
        let transactions = api.upload_transactions(&upload_id).await?;
        return Ok(UploadOutcome::Parsed {
            upload_id,
            transactions,
        });
    }
    match response.client_matches {
        Some(matches) => Ok(UploadOutcome::AmbiguousClient {
            candidates: matches.iter().map(|m| ref_display(Some(m))).collect(),
            message: response
                .message
                .unwrap_or_else(|| "Multiple clients match this statement".to_string()),
        }),
        None => Err(BookdeskError::Other(
            response
                .message
                .unwrap_or_else(|| "Upload response had no upload id".to_string()),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

pub fn preview_coa(file: &Path) -> Result<CsvPreview> {
    if extension(file).as_deref() != Some("csv") {
        return Err(BookdeskError::Validation(
            "Chart of accounts must be a CSV file".to_string(),
        ));
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(file)?;
    let headers = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    let mut total_rows = 0;
    for record in reader.records() {
        let record = record?;
        if rows.len() < COA_PREVIEW_ROWS {
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }
        total_rows += 1;
    }
    Ok(CsvPreview {
        headers,
        rows,
        total_rows,
    })
}

/// Only Desktop clients keep an uploaded chart of accounts.
pub fn require_desktop(client: &Client) -> Result<()> {
    if !client.is_desktop() {
        return Err(BookdeskError::Validation(format!(
            "'{}' is not a QuickBooks Desktop client; its accounts come from QuickBooks Online",
            client.name
        )));
    }
    Ok(())
}

pub async fn upload_coa(api: &ApiClient, client: &Client, file: &Path) -> Result<CsvPreview> {
    require_desktop(client)?;
    let preview = preview_coa(file)?;
    api.upload_coa(&client.id, file).await?;
    info!(client = %client.id, rows = preview.total_rows, "chart of accounts uploaded");
    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::client_for;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(id: &str, name: &str, account_type: &str) -> Client {
        serde_json::from_value(json!({"_id": id, "name": name, "account_type": account_type})).unwrap()
    }

    #[test]
    fn test_detect_client_from_filename() {
        let clients = vec![client("c1", "Acme Corp", "online"), client("c2", "Blue Sky LLC", "desktop")];
        assert_eq!(detect_client_from_filename("BLUE_statement_jan.pdf", &clients).unwrap().id, "c2");
        assert_eq!(detect_client_from_filename("acme-2025-01.csv", &clients).unwrap().id, "c1");
        assert!(detect_client_from_filename("bank.csv", &clients).is_none());
    }

    #[test]
    fn test_statement_extension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(validate_statement(&txt), Err(BookdeskError::Validation(_))));

        let pdf = dir.path().join("Jan.PDF");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert!(validate_statement(&pdf).is_ok());
    }

    #[test]
    fn test_statement_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.csv");
        let f = std::fs::File::create(&big).unwrap();
        f.set_len(MAX_STATEMENT_BYTES + 1).unwrap();
        let err = validate_statement(&big).unwrap_err();
        assert!(err.to_string().contains("10 MB"));
    }

    #[test]
    fn test_coa_preview_first_five_rows() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("coa.csv");
        let mut f = std::fs::File::create(&file).unwrap();
        writeln!(f, "Accnt. #,Account,Type,Balance Total").unwrap();
        for i in 0..8 {
            writeln!(f, "{},Account {i},Expense,0.00", 6000 + i).unwrap();
        }
        drop(f);

        let preview = preview_coa(&file).unwrap();
        assert_eq!(preview.headers, vec!["Accnt. #", "Account", "Type", "Balance Total"]);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.total_rows, 8);
        assert_eq!(preview.rows[0][1], "Account 0");
    }

    #[tokio::test]
    async fn test_upload_then_fetch_transactions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"upload_id": "u1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/transactions/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"transaction_id": "T1", "vendor_name": "Shell", "amount": -20.0}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acme.csv");
        std::fs::write(&file, "Date,Description,Amount\n").unwrap();

        match upload_statement(&api, &file, &client("c1", "Acme", "online")).await.unwrap() {
            UploadOutcome::Parsed { upload_id, transactions } => {
                assert_eq!(upload_id, "u1");
                assert_eq!(transactions.len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ambiguous_client_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "client_matches": ["Acme East", {"_id": "c9", "name": "Acme West"}],
                "message": "Select a client"
            })))
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("acme.pdf");
        std::fs::write(&file, "%PDF-1.4").unwrap();

        match upload_statement(&api, &file, &client("c1", "Acme", "online")).await.unwrap() {
            UploadOutcome::AmbiguousClient { candidates, message } => {
                assert_eq!(candidates, vec!["Acme East", "Acme West"]);
                assert_eq!(message, "Select a client");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_coa_upload_online_client_rejected() {
        let server = MockServer::start().await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("coa.csv");
        std::fs::write(&file, "Account\nRent\n").unwrap();
        assert!(upload_coa(&api, &client("c1", "Web", "online"), &file).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
