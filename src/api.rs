//! Typed client for the bookkeeping backend REST API.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::audit::LogFilter;
use crate::error::{BookdeskError, Result};
use crate::exporter::{IifRequest, PushRequest, PushResponse};
use crate::models::{
    Client, ClientInput, CoaData, LogEntry, NewRule, QboAccount, Rule, RuleUpdate, Transaction,
    TransactionUpdate, Upload,
};
use crate::quickbooks::{QboKeys, QboStatus, RegisterAccount, RegisterSelection};
use crate::settings::Settings;
use crate::uploads::UploadResponse;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            token: settings.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(method = %method, path, "api request");
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, path: &str) -> Result<T> {
        let response = check(builder.send().await?, path).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder, path: &str) -> Result<()> {
        check(builder.send().await?, path).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path), path).await
    }

    async fn with_body<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.request(method, path).json(body), path).await
    }

    // -- clients ----------------------------------------------------------

    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        self.get("/clients").await
    }

    pub async fn create_client(&self, input: &ClientInput) -> Result<Client> {
        self.with_body(Method::POST, "/clients", input).await
    }

    pub async fn update_client(&self, client_id: &str, input: &ClientInput) -> Result<Client> {
        self.with_body(Method::PUT, &format!("/clients/{client_id}"), input)
            .await
    }

    pub async fn delete_client(&self, client_id: &str) -> Result<()> {
        let path = format!("/clients/{client_id}");
        self.send_empty(self.request(Method::DELETE, &path), &path).await
    }

    // -- categories -------------------------------------------------------

    pub async fn qbo_accounts(&self, client_id: &str) -> Result<Vec<QboAccount>> {
        self.get(&format!("/api/qbo/{client_id}/accounts")).await
    }

    pub async fn coa_data(&self, client_id: &str) -> Result<CoaData> {
        self.get(&format!("/coa/{client_id}/data")).await
    }

    pub async fn upload_coa(&self, client_id: &str, file: &Path) -> Result<serde_json::Value> {
        let path = format!("/coa/{client_id}/upload");
        let form = Form::new().part("file", file_part(file, "text/csv").await?);
        self.send(self.request(Method::POST, &path).multipart(form), &path)
            .await
    }

    // -- transactions -----------------------------------------------------

    pub async fn client_transactions(&self, client_id: &str) -> Result<Vec<Transaction>> {
        self.get(&format!("/transactions/client/{client_id}")).await
    }

    pub async fn upload_transactions(&self, upload_id: &str) -> Result<Vec<Transaction>> {
        self.get(&format!("/transactions/{upload_id}")).await
    }

    pub async fn update_transaction(
        &self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        self.with_body(
            Method::PATCH,
            &format!("/transactions/{transaction_id}"),
            update,
        )
        .await
    }

    // -- rules ------------------------------------------------------------

    pub async fn list_rules(&self, client_id: &str) -> Result<Vec<Rule>> {
        self.get(&format!("/rules/{client_id}")).await
    }

    pub async fn create_rule(&self, rule: &NewRule) -> Result<Rule> {
        self.with_body(Method::POST, "/rules", rule).await
    }

    pub async fn update_rule(&self, rule_id: &str, update: &RuleUpdate) -> Result<Rule> {
        self.with_body(Method::PATCH, &format!("/rules/{rule_id}"), update)
            .await
    }

    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let path = format!("/rules/{rule_id}");
        self.send_empty(self.request(Method::DELETE, &path), &path).await
    }

    // -- export -----------------------------------------------------------

    /// A 401 here means the stored QuickBooks token expired, not that the
    /// bookdesk session is invalid.
    pub async fn push_to_qbo(&self, client_id: &str, request: &PushRequest) -> Result<PushResponse> {
        self.with_body(Method::POST, &format!("/api/qbo/{client_id}/push"), request)
            .await
            .map_err(|e| match e {
                BookdeskError::Unauthorized(_) => BookdeskError::ReconnectRequired,
                other => other,
            })
    }

    pub async fn export_iif(&self, client_id: &str, request: &IifRequest) -> Result<Vec<u8>> {
        let path = format!("/export/qbd/{client_id}/iif");
        let response = check(
            self.request(Method::POST, &path).json(request).send().await?,
            &path,
        )
        .await?;
        Ok(response.bytes().await?.to_vec())
    }

    // -- uploads ----------------------------------------------------------

    pub async fn list_uploads(&self) -> Result<Vec<Upload>> {
        self.get("/uploads").await
    }

    pub async fn upload_statement(&self, file: &Path, client_id: &str) -> Result<UploadResponse> {
        let mime = if has_extension(file, "csv") {
            "text/csv"
        } else {
            "application/pdf"
        };
        let form = Form::new()
            .part("file", file_part(file, mime).await?)
            .text("client_id", client_id.to_string());
        self.send(self.request(Method::POST, "/uploads").multipart(form), "/uploads")
            .await
    }

    // -- quickbooks connection --------------------------------------------

    pub async fn qbo_save_keys(&self, client_id: &str, keys: &QboKeys) -> Result<serde_json::Value> {
        self.with_body(Method::POST, &format!("/api/qbo/{client_id}/keys"), keys)
            .await
    }

    pub async fn qbo_status(&self, client_id: &str) -> Result<QboStatus> {
        self.get(&format!("/api/qbo/{client_id}/status")).await
    }

    pub fn qbo_connect_url(&self, client_id: &str) -> String {
        format!("{}/api/qbo/{client_id}/connect", self.base_url)
    }

    pub async fn qbo_disconnect(&self, client_id: &str, token_type: &str) -> Result<serde_json::Value> {
        self.with_body(
            Method::POST,
            &format!("/api/qbo/{client_id}/disconnect"),
            &serde_json::json!({ "tokenType": token_type }),
        )
        .await
    }

    pub async fn qbo_register_accounts(&self, client_id: &str) -> Result<Vec<RegisterAccount>> {
        self.get(&format!("/api/qbo/{client_id}/register-accounts"))
            .await
    }

    pub async fn qbo_set_register(
        &self,
        client_id: &str,
        upload_id: &str,
        selection: &RegisterSelection,
    ) -> Result<serde_json::Value> {
        self.with_body(
            Method::POST,
            &format!("/api/qbo/{client_id}/uploads/{upload_id}/register"),
            selection,
        )
        .await
    }

    // -- audit log --------------------------------------------------------

    pub async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        self.send(self.request(Method::GET, "/logs").query(filter), "/logs")
            .await
    }

    pub async fn rollback_upload(&self, upload_id: &str) -> Result<serde_json::Value> {
        let path = format!("/rollback/{upload_id}");
        self.send(self.request(Method::POST, &path), &path).await
    }
}

/// Turn a non-success response into an error carrying the backend's message.
async fn check(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = backend_message(&body);
    warn!(status = status.as_u16(), path, message = message.as_deref().unwrap_or(""), "api error");
    if status == StatusCode::UNAUTHORIZED {
        return Err(BookdeskError::Unauthorized(
            message.unwrap_or_else(|| "session expired or token missing".to_string()),
        ));
    }
    Err(BookdeskError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Error bodies carry either `message` or `error`.
fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

async fn file_part(file: &Path, mime: &str) -> Result<Part> {
    let bytes = tokio::fs::read(file).await?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(name).mime_str(mime)?)
}
