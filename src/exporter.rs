//! Export of approved transactions, dispatched on the client's account type:
//! QuickBooks Online gets an API push, QuickBooks Desktop gets an IIF file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::{deserialize_record, lenient_string, AccountType, Client, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMethod {
    QboPush,
    IifFile,
}

impl ExportMethod {
    pub fn for_client(client: &Client) -> Result<Self> {
        match client.account_type {
            AccountType::Online => Ok(ExportMethod::QboPush),
            AccountType::Desktop => Ok(ExportMethod::IifFile),
            AccountType::Unknown => Err(BookdeskError::Validation(format!(
                "Client '{}' has no QuickBooks account type; cannot export",
                client.name
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PushRequest {
    Selected {
        #[serde(rename = "transactionIds")]
        transaction_ids: Vec<String>,
    },
    AllApproved {
        #[serde(rename = "uploadId")]
        upload_id: String,
        #[serde(rename = "pushAllApproved")]
        push_all_approved: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self")]
pub struct PushResult {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub qbo_txn_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Pushed { qbo_txn_id: Option<String> },
    AlreadyPushed { qbo_txn_id: Option<String> },
    Failed { message: String },
}

deserialize_record!(PushResult, "_id", "transaction_id");

impl PushResult {
    pub fn outcome(&self) -> PushOutcome {
        if self.ok {
            PushOutcome::Pushed {
                qbo_txn_id: self.qbo_txn_id.clone(),
            }
        } else if self.skipped {
            PushOutcome::AlreadyPushed {
                qbo_txn_id: self.qbo_txn_id.clone(),
            }
        } else {
            PushOutcome::Failed {
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "Push failed".to_string()),
            }
        }
    }
}

impl std::fmt::Display for PushOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let qbo = |id: &Option<String>| id.as_deref().map(|i| format!(" (QBO #{i})")).unwrap_or_default();
        match self {
            PushOutcome::Pushed { qbo_txn_id } => write!(f, "Pushed{}", qbo(qbo_txn_id)),
            PushOutcome::AlreadyPushed { qbo_txn_id } => write!(f, "Already pushed{}", qbo(qbo_txn_id)),
            PushOutcome::Failed { message } => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub results: Vec<PushResult>,
    #[serde(default)]
    pub transactions_queued: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One row of a push report. `outcome` is `None` when the backend said
/// nothing about a transaction we sent; `transaction` is `None` when the
/// backend reported on one we do not have locally.
#[derive(Debug, Clone)]
pub struct PushLine {
    pub id: String,
    pub transaction: Option<Transaction>,
    pub outcome: Option<PushOutcome>,
}

#[derive(Debug, Clone)]
pub struct PushReport {
    pub lines: Vec<PushLine>,
    pub queued: Option<u64>,
    pub message: Option<String>,
}

impl PushReport {
    pub fn count(&self, pred: impl Fn(&PushOutcome) -> bool) -> usize {
        self.lines
            .iter()
            .filter(|l| l.outcome.as_ref().is_some_and(&pred))
            .count()
    }
}

/// Pair push results with transactions by id. Result order is not tied to
/// the order transactions were listed in. Results for ids outside
/// `transactions` are appended in backend order.
pub fn reconcile(transactions: &[Transaction], results: &[PushResult]) -> Vec<PushLine> {
    let by_id: HashMap<&str, &PushResult> = results.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut lines: Vec<PushLine> = transactions
        .iter()
        .map(|t| PushLine {
            id: t.transaction_id.clone(),
            transaction: Some(t.clone()),
            outcome: by_id.get(t.transaction_id.as_str()).map(|r| r.outcome()),
        })
        .collect();
    for r in results {
        if !transactions.iter().any(|t| t.transaction_id == r.id) {
            lines.push(PushLine {
                id: r.id.clone(),
                transaction: None,
                outcome: Some(r.outcome()),
            });
        }
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushScope {
    /// Every approved transaction in the given list.
    Approved,
    /// Let the backend push everything approved in one upload.
    Upload(String),
}

pub async fn push_online(
    api: &ApiClient,
    client: &Client,
    transactions: &[Transaction],
    scope: PushScope,
) -> Result<PushReport> {
    if ExportMethod::for_client(client)? != ExportMethod::QboPush {
        return Err(BookdeskError::Validation(
            "QuickBooks Desktop clients export an IIF file; push is only for QuickBooks Online".to_string(),
        ));
    }
    let approved: Vec<Transaction> = transactions.iter().filter(|t| t.approved).cloned().collect();
    let request = match scope {
        PushScope::Approved => {
            if approved.is_empty() {
                return Err(BookdeskError::Validation(
                    "No approved transactions to push".to_string(),
                ));
            }
            PushRequest::Selected {
                transaction_ids: approved.iter().map(|t| t.transaction_id.clone()).collect(),
            }
        }
        PushScope::Upload(upload_id) => PushRequest::AllApproved {
            upload_id,
            push_all_approved: true,
        },
    };

    let response = api.push_to_qbo(&client.id, &request).await?;
    info!(client = %client.id, results = response.results.len(), "pushed to QuickBooks Online");
    let mut lines = match &request {
        PushRequest::AllApproved { upload_id, .. } => {
            let in_upload: Vec<Transaction> = approved
                .into_iter()
                .filter(|t| t.upload_id.as_deref() == Some(upload_id.as_str()))
                .collect();
            reconcile(&in_upload, &response.results)
        }
        PushRequest::Selected { .. } => reconcile(&approved, &response.results),
    };
    for line in lines.iter_mut().filter(|l| l.transaction.is_none()) {
        line.transaction = transactions.iter().find(|t| t.transaction_id == line.id).cloned();
    }
    Ok(PushReport {
        lines,
        queued: response.transactions_queued,
        message: response.message,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IifRequest {
    pub transaction_ids: Vec<String>,
    pub register_account_name: String,
}

#[derive(Debug, Clone)]
pub struct IifExport {
    pub path: PathBuf,
    pub transaction_count: usize,
    pub bytes: usize,
}

/// `{client_name}_transactions.iif` with path separators and other
/// characters that are invalid in filenames replaced.
pub fn iif_filename(client_name: &str) -> Result<String> {
    let invalid = Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#)
        .map_err(|e| BookdeskError::Other(e.to_string()))?;
    let name = invalid.replace_all(client_name.trim(), "_");
    let name = if name.is_empty() { "client".into() } else { name };
    Ok(format!("{name}_transactions.iif"))
}

/// The register account name is required before anything else happens.
pub fn validate_register_account(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BookdeskError::Validation(
            "Register account name is required for QuickBooks Desktop export".to_string(),
        ));
    }
    Ok(name)
}

pub async fn export_iif(
    api: &ApiClient,
    client: &Client,
    transactions: &[Transaction],
    register_account_name: &str,
    out_dir: &Path,
) -> Result<IifExport> {
    let register = validate_register_account(register_account_name)?;
    if ExportMethod::for_client(client)? != ExportMethod::IifFile {
        return Err(BookdeskError::Validation(
            "QuickBooks Online clients are pushed directly; IIF export is only for QuickBooks Desktop".to_string(),
        ));
    }
    let ids: Vec<String> = transactions
        .iter()
        .filter(|t| t.approved)
        .map(|t| t.transaction_id.clone())
        .collect();
    if ids.is_empty() {
        return Err(BookdeskError::Validation(
            "No approved transactions to export".to_string(),
        ));
    }

    let request = IifRequest {
        transaction_ids: ids,
        register_account_name: register.to_string(),
    };
    let body = api.export_iif(&client.id, &request).await?;

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(iif_filename(&client.name)?);
    std::fs::write(&path, &body)?;
    info!(client = %client.id, path = %path.display(), "IIF file written");
    Ok(IifExport {
        path,
        transaction_count: request.transaction_ids.len(),
        bytes: body.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(account_type: &str, name: &str) -> Client {
        serde_json::from_value(json!({"_id": "c1", "name": name, "account_type": account_type})).unwrap()
    }

    fn txn(id: &str, approved: bool) -> Transaction {
        serde_json::from_value(json!({
            "transaction_id": id, "upload_id": "u1", "vendor_name": "V", "amount": -1.0, "approved": approved
        }))
        .unwrap()
    }

    #[test]
    fn test_push_request_shapes() {
        let selected = PushRequest::Selected { transaction_ids: vec!["T1".into()] };
        assert_eq!(serde_json::to_value(&selected).unwrap(), json!({"transactionIds": ["T1"]}));
        let all = PushRequest::AllApproved { upload_id: "u1".into(), push_all_approved: true };
        assert_eq!(
            serde_json::to_value(&all).unwrap(),
            json!({"uploadId": "u1", "pushAllApproved": true})
        );
    }

    #[test]
    fn test_reconcile_by_id_not_position() {
        let txns = vec![txn("T1", true), txn("T2", true), txn("T3", true)];
        let results: Vec<PushResult> = serde_json::from_value(json!([
            {"_id": "T2", "error": "Account 'Fuel' not found in QuickBooks"},
            {"_id": "T1", "ok": true, "qbo_txn_id": "99"}
        ]))
        .unwrap();

        let lines = reconcile(&txns, &results);
        assert_eq!(lines[0].outcome, Some(PushOutcome::Pushed { qbo_txn_id: Some("99".into()) }));
        assert_eq!(
            lines[1].outcome,
            Some(PushOutcome::Failed { message: "Account 'Fuel' not found in QuickBooks".into() })
        );
        assert_eq!(lines[2].outcome, None);
        assert_eq!(lines[0].outcome.as_ref().unwrap().to_string(), "Pushed (QBO #99)");
        assert_eq!(lines[1].outcome.as_ref().unwrap().to_string(), "Account 'Fuel' not found in QuickBooks");
    }

    #[test]
    fn test_reconcile_keeps_results_for_unknown_ids() {
        let txns = vec![txn("T1", true)];
        let results: Vec<PushResult> = serde_json::from_value(json!([
            {"_id": "T9", "error": "Account missing"},
            {"_id": "T1", "ok": true}
        ]))
        .unwrap();

        let lines = reconcile(&txns, &results);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].id, "T9");
        assert!(lines[1].transaction.is_none());
        assert_eq!(lines[1].outcome, Some(PushOutcome::Failed { message: "Account missing".into() }));
    }

    #[test]
    fn test_push_result_with_both_id_keys() {
        let r: PushResult =
            serde_json::from_value(json!({"_id": "T1", "transaction_id": "T1", "ok": true})).unwrap();
        assert_eq!(r.id, "T1");
        let r: PushResult = serde_json::from_value(json!({"transaction_id": "T2", "skipped": true})).unwrap();
        assert_eq!(r.id, "T2");
    }

    #[test]
    fn test_skipped_outcome_and_numeric_qbo_id() {
        let r: PushResult = serde_json::from_value(json!({"_id": "T1", "skipped": true, "qbo_txn_id": 145})).unwrap();
        assert_eq!(r.outcome(), PushOutcome::AlreadyPushed { qbo_txn_id: Some("145".into()) });
        assert_eq!(r.outcome().to_string(), "Already pushed (QBO #145)");
    }

    #[test]
    fn test_iif_filename() {
        assert_eq!(iif_filename("Acme").unwrap(), "Acme_transactions.iif");
        assert_eq!(iif_filename("Smith & Co/West").unwrap(), "Smith & Co_West_transactions.iif");
        assert_eq!(iif_filename("  ").unwrap(), "client_transactions.iif");
    }

    #[test]
    fn test_method_follows_account_type() {
        assert_eq!(ExportMethod::for_client(&client("online", "A")).unwrap(), ExportMethod::QboPush);
        assert_eq!(ExportMethod::for_client(&client("desktop", "A")).unwrap(), ExportMethod::IifFile);
        assert!(ExportMethod::for_client(&client("", "A")).is_err());
    }

    #[tokio::test]
    async fn test_online_push_sends_only_approved_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/qbo/c1/push"))
            .and(body_json(json!({"transactionIds": ["T1", "T3"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                {"_id": "T3", "ok": true, "qbo_txn_id": "12"},
                {"_id": "T1", "error": "Duplicate"}
            ]})))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let txns = vec![txn("T1", true), txn("T2", false), txn("T3", true)];

        let report = push_online(&api, &client("online", "Web"), &txns, PushScope::Approved)
            .await
            .unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.count(|o| matches!(o, PushOutcome::Pushed { .. })), 1);
        assert_eq!(report.count(|o| matches!(o, PushOutcome::Failed { .. })), 1);
        assert_eq!(report.lines[0].id, "T1");
        assert!(report.lines[0].transaction.is_some());
    }

    #[tokio::test]
    async fn test_push_all_approved_for_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/qbo/c1/push"))
            .and(body_json(json!({"uploadId": "u1", "pushAllApproved": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "transactions_queued": 3})))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());

        let report = push_online(&api, &client("online", "Web"), &[], PushScope::Upload("u1".into()))
            .await
            .unwrap();
        assert_eq!(report.queued, Some(3));
    }

    #[tokio::test]
    async fn test_upload_push_reports_results_outside_local_view() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/qbo/c1/push"))
            .and(body_json(json!({"uploadId": "u1", "pushAllApproved": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                {"_id": "T1", "ok": true},
                {"_id": "T2", "error": "Account missing"}
            ]})))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let mut other = txn("T2", true);
        other.upload_id = Some("u2".into());
        let txns = vec![txn("T1", true), other];

        let report = push_online(&api, &client("online", "Web"), &txns, PushScope::Upload("u1".into()))
            .await
            .unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.count(|o| matches!(o, PushOutcome::Pushed { .. })), 1);
        assert_eq!(report.count(|o| matches!(o, PushOutcome::Failed { .. })), 1);
        assert_eq!(report.lines[1].id, "T2");
        let local = report.lines[1].transaction.as_ref().unwrap();
        assert_eq!(local.upload_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn test_desktop_never_calls_push() {
        let server = MockServer::start().await;
        let api = client_for(&server.uri());
        let err = push_online(&api, &client("desktop", "Acme"), &[txn("T1", true)], PushScope::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, BookdeskError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_register_name_blocked_before_request() {
        let server = MockServer::start().await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();

        let err = export_iif(&api, &client("desktop", "Acme"), &[txn("T1", true)], "  ", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Register account name is required"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_online_client_cannot_export_iif() {
        let server = MockServer::start().await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();
        let err = export_iif(&api, &client("online", "Web"), &[txn("T1", true)], "Checking", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BookdeskError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_iif_written_with_client_filename() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/export/qbd/c1/iif$"))
            .and(body_json(json!({"transaction_ids": ["T1"], "register_account_name": "Checking"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"!TRNS\tDATE\tACCNT\n".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let dir = tempfile::tempdir().unwrap();

        let export = export_iif(
            &api,
            &client("desktop", "Acme"),
            &[txn("T1", true), txn("T2", false)],
            " Checking ",
            dir.path(),
        )
        .await
        .unwrap();
        assert_eq!(export.path, dir.path().join("Acme_transactions.iif"));
        assert_eq!(export.transaction_count, 1);
        assert_eq!(export.bytes, 17);
        assert_eq!(std::fs::read(&export.path).unwrap(), b"!TRNS\tDATE\tACCNT\n");
    }
}
