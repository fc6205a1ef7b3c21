//! Where a client's selectable categories come from.
//!
//! Online clients use the live QuickBooks chart of accounts; desktop clients
//! use the rows of their most recent COA upload. The two sources are never
//! mixed in one list.

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::{AccountType, Client, CoaRow, QboAccount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    QboAccounts,
    CoaUpload,
    None,
}

impl CategorySource {
    pub fn for_account_type(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Online => CategorySource::QboAccounts,
            AccountType::Desktop => CategorySource::CoaUpload,
            AccountType::Unknown => CategorySource::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategorySource::QboAccounts => "QuickBooks chart of accounts",
            CategorySource::CoaUpload => "uploaded chart of accounts",
            CategorySource::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub id: String,
    pub name: String,
    pub number: Option<String>,
    pub account_type: Option<String>,
    pub detail_type: Option<String>,
    pub balance: Option<String>,
    /// The label a reviewer picks and the value stored as `manual_category`.
    pub display_text: String,
}

impl CategoryEntry {
    pub fn from_qbo(account: QboAccount) -> Self {
        let display_text = account
            .fully_qualified_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| account.name.clone());
        Self {
            id: account.id,
            name: account.name,
            number: account.number,
            account_type: account.account_type,
            detail_type: account.sub_type,
            balance: None,
            display_text,
        }
    }

    /// `None` for rows without an account name.
    pub fn from_coa(row: CoaRow, position: usize) -> Option<Self> {
        let name = row.name.filter(|n| !n.trim().is_empty())?;
        let display_text = match row.number.as_deref() {
            Some(number) => format!("{number} - {name}"),
            None => name.clone(),
        };
        Some(Self {
            id: row.id.unwrap_or_else(|| format!("coa-{position}")),
            name,
            number: row.number,
            account_type: row.account_type,
            detail_type: row.detail_type,
            balance: row.balance,
            display_text,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryList {
    pub client_id: String,
    pub source: CategorySource,
    pub entries: Vec<CategoryEntry>,
}

impl CategoryList {
    pub fn empty(client_id: &str, source: CategorySource) -> Self {
        Self {
            client_id: client_id.to_string(),
            source,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn find(&self, label: &str) -> Option<&CategoryEntry> {
        self.entries.iter().find(|e| e.display_text == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.find(label).is_some()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.display_text.as_str()).collect()
    }
}

/// Why a resolution produced no categories. Both cases are retryable.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveProblem {
    UnknownAccountType,
    FetchFailed(String),
}

impl std::fmt::Display for ResolveProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveProblem::UnknownAccountType => {
                write!(f, "Client has no QuickBooks account type set")
            }
            ResolveProblem::FetchFailed(msg) => write!(f, "Failed to load categories: {msg}"),
        }
    }
}

/// What the user should do about an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyAction {
    UploadCoa { client_id: String },
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub categories: CategoryList,
    pub problem: Option<ResolveProblem>,
}

impl Resolution {
    pub fn empty_action(&self) -> Option<EmptyAction> {
        if !self.categories.is_empty() {
            return None;
        }
        Some(match self.categories.source {
            CategorySource::CoaUpload => EmptyAction::UploadCoa {
                client_id: self.categories.client_id.clone(),
            },
            _ => EmptyAction::Skip,
        })
    }
}

/// Fetch and map the categories for `client`. Never fails: fetch errors come
/// back as an empty list with a problem attached.
pub async fn resolve(api: &ApiClient, client: &Client) -> Resolution {
    let source = CategorySource::for_account_type(client.account_type);
    let fetched = match source {
        CategorySource::QboAccounts => api.qbo_accounts(&client.id).await.map(|accounts| {
            accounts
                .into_iter()
                .filter(|a| a.active)
                .map(CategoryEntry::from_qbo)
                .collect::<Vec<_>>()
        }),
        CategorySource::CoaUpload => api.coa_data(&client.id).await.map(|coa| {
            coa.data
                .into_iter()
                .enumerate()
                .filter_map(|(i, row)| CategoryEntry::from_coa(row, i))
                .collect::<Vec<_>>()
        }),
        CategorySource::None => {
            return Resolution {
                categories: CategoryList::empty(&client.id, source),
                problem: Some(ResolveProblem::UnknownAccountType),
            };
        }
    };

    match fetched {
        Ok(entries) => {
            debug!(client = %client.id, count = entries.len(), source = source.label(), "categories resolved");
            Resolution {
                categories: CategoryList {
                    client_id: client.id.clone(),
                    source,
                    entries,
                },
                problem: None,
            }
        }
        Err(e) => {
            warn!(client = %client.id, error = %e, "category fetch failed");
            Resolution {
                categories: CategoryList::empty(&client.id, source),
                problem: Some(ResolveProblem::FetchFailed(e.to_string())),
            }
        }
    }
}

/// Token handed out per selection/refresh. A response commits only if its
/// token is still the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToken(u64);

#[derive(Default)]
struct ResolverState {
    generation: u64,
    selected: Option<Client>,
    current: Option<Resolution>,
}

/// Holds the categories for the currently selected client and drops
/// responses that arrive after the selection moved on.
pub struct CategoryResolver {
    api: ApiClient,
    state: Mutex<ResolverState>,
}

impl CategoryResolver {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Mutex::new(ResolverState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switch the selection. Categories of the previous client are cleared.
    pub fn select(&self, client: &Client) -> SelectionToken {
        let mut state = self.lock();
        state.generation += 1;
        state.selected = Some(client.clone());
        state.current = None;
        SelectionToken(state.generation)
    }

    pub fn current(&self) -> Option<Resolution> {
        self.lock().current.clone()
    }

    /// Resolve categories for `client` under `token`. Returns the committed
    /// resolution, or `None` when the result was stale and discarded.
    pub async fn load(&self, token: SelectionToken, client: &Client) -> Option<Resolution> {
        let resolution = resolve(&self.api, client).await;
        let mut state = self.lock();
        let still_selected = state
            .selected
            .as_ref()
            .is_some_and(|c| c.id == client.id);
        if token.0 != state.generation || !still_selected {
            debug!(client = %client.id, "discarding stale category response");
            return None;
        }
        state.current = Some(resolution.clone());
        Some(resolution)
    }

    /// Select `client` and load its categories.
    pub async fn select_and_load(&self, client: &Client) -> Option<Resolution> {
        let token = self.select(client);
        self.load(token, client).await
    }

    /// Re-run resolution for the current selection without clearing what is
    /// shown until the new result commits.
    pub async fn refresh(&self) -> Option<Resolution> {
        let (token, client) = {
            let mut state = self.lock();
            let client = state.selected.clone()?;
            state.generation += 1;
            (SelectionToken(state.generation), client)
        };
        self.load(token, &client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::client_for;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(id: &str, account_type: &str) -> Client {
        serde_json::from_value(json!({"_id": id, "name": id, "account_type": account_type})).unwrap()
    }

    async fn mount_qbo(server: &MockServer, client_id: &str, delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/qbo/{client_id}/accounts")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([
                        {"id": "1", "name": "Meals", "fullyQualifiedName": "Expenses:Meals", "type": "Expense"},
                        {"id": "2", "name": "Old", "active": false}
                    ]))
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    async fn mount_coa(server: &MockServer, client_id: &str, delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/coa/{client_id}/data")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [
                        {"Accnt. #": "1000", "Account": "Checking", "Type": "Bank", "Balance Total": "1200.00"},
                        {"Account": "Ask Client"},
                        {"Accnt. #": "9999"}
                    ]}))
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_desktop_uses_coa_display_text() {
        let server = MockServer::start().await;
        mount_coa(&server, "acme", 0).await;
        let acme = client("acme", "desktop");

        let res = resolve(&client_for(&server.uri()), &acme).await;
        assert!(res.problem.is_none());
        assert_eq!(res.categories.source, CategorySource::CoaUpload);
        assert_eq!(res.categories.labels(), vec!["1000 - Checking", "Ask Client"]);
        let checking = res.categories.find("1000 - Checking").unwrap();
        assert_eq!(checking.balance.as_deref(), Some("1200.00"));
        assert_eq!(checking.id, "coa-0");
    }

    #[tokio::test]
    async fn test_online_uses_only_qbo_accounts() {
        let server = MockServer::start().await;
        mount_qbo(&server, "web", 0).await;
        mount_coa(&server, "web", 0).await;
        let web = client("web", "online");

        let res = resolve(&client_for(&server.uri()), &web).await;
        assert_eq!(res.categories.source, CategorySource::QboAccounts);
        assert_eq!(res.categories.labels(), vec!["Expenses:Meals"]);
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| !r.url.path().starts_with("/coa/")));
    }

    #[tokio::test]
    async fn test_unknown_type_is_empty_without_request() {
        let server = MockServer::start().await;
        let res = resolve(&client_for(&server.uri()), &client("x", "")).await;
        assert!(res.categories.is_empty());
        assert_eq!(res.problem, Some(ResolveProblem::UnknownAccountType));
        assert_eq!(res.empty_action(), Some(EmptyAction::Skip));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_empty_and_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coa/acme/data"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "No COA uploaded"})))
            .mount(&server)
            .await;

        let res = resolve(&client_for(&server.uri()), &client("acme", "desktop")).await;
        assert!(res.categories.is_empty());
        assert_eq!(
            res.problem,
            Some(ResolveProblem::FetchFailed("No COA uploaded".to_string()))
        );
        assert_eq!(
            res.empty_action(),
            Some(EmptyAction::UploadCoa { client_id: "acme".to_string() })
        );
    }

    #[tokio::test]
    async fn test_late_response_for_previous_client_is_discarded() {
        let server = MockServer::start().await;
        mount_qbo(&server, "slow", 300).await;
        mount_coa(&server, "fast", 0).await;
        let resolver = CategoryResolver::new(client_for(&server.uri()));
        let slow = client("slow", "online");
        let fast = client("fast", "desktop");

        let slow_token = resolver.select(&slow);
        let fast_token = resolver.select(&fast);
        let (slow_res, fast_res) = tokio::join!(
            resolver.load(slow_token, &slow),
            resolver.load(fast_token, &fast)
        );

        assert!(slow_res.is_none());
        assert!(fast_res.is_some());
        let current = resolver.current().unwrap();
        assert_eq!(current.categories.client_id, "fast");
        assert_eq!(current.categories.source, CategorySource::CoaUpload);
    }

    #[tokio::test]
    async fn test_early_response_for_previous_client_is_discarded() {
        let server = MockServer::start().await;
        mount_qbo(&server, "first", 0).await;
        mount_coa(&server, "second", 200).await;
        let resolver = CategoryResolver::new(client_for(&server.uri()));
        let first = client("first", "online");
        let second = client("second", "desktop");

        let first_token = resolver.select(&first);
        let first_load = resolver.load(first_token, &first);
        let second_load = async {
            let token = resolver.select(&second);
            resolver.load(token, &second).await
        };
        let (_, second_res) = tokio::join!(first_load, second_load);

        assert!(second_res.is_some());
        assert_eq!(resolver.current().unwrap().categories.client_id, "second");
    }

    #[tokio::test]
    async fn test_refresh_reloads_current_selection() {
        let server = MockServer::start().await;
        mount_coa(&server, "acme", 0).await;
        let resolver = CategoryResolver::new(client_for(&server.uri()));
        assert!(resolver.refresh().await.is_none());

        resolver.select_and_load(&client("acme", "desktop")).await.unwrap();
        let refreshed = resolver.refresh().await.unwrap();
        assert_eq!(refreshed.categories.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }
}
