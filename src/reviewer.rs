use tracing::info;

use crate::api::ApiClient;
use crate::categories::CategoryList;
use crate::error::{BookdeskError, Result};
use crate::models::{Client, NewRule, Rule, Transaction, TransactionUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    NeedsReview,
    AutoCategorized,
    ManuallyCategorized,
    Approved,
}

impl ReviewState {
    pub fn of(txn: &Transaction) -> Self {
        if txn.approved {
            ReviewState::Approved
        } else if txn.manual_category.is_some() {
            ReviewState::ManuallyCategorized
        } else if txn.auto_category.is_some() {
            ReviewState::AutoCategorized
        } else {
            ReviewState::NeedsReview
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewState::NeedsReview => "needs review",
            ReviewState::AutoCategorized => "auto",
            ReviewState::ManuallyCategorized => "manual",
            ReviewState::Approved => "approved",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCounts {
    pub approved: usize,
    pub pending: usize,
    pub pushed: usize,
}

/// Offer to turn a manual categorization into a vendor rule. Produced once
/// per successful categorization; consumed by `accept` or `decline`.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct RuleOffer {
    pub client_id: String,
    pub vendor_contains: String,
    pub map_to_account: String,
}

impl RuleOffer {
    pub fn prompt(&self) -> String {
        format!(
            "Create rule: vendor contains '{}' \u{2192} {}?",
            self.vendor_contains, self.map_to_account
        )
    }

    /// Create the rule. A failure here leaves the categorization in place.
    pub async fn accept(self, api: &ApiClient) -> Result<Rule> {
        let rule = api
            .create_rule(&NewRule {
                client_id: self.client_id,
                vendor_contains: self.vendor_contains,
                map_to_account: self.map_to_account,
            })
            .await?;
        info!(rule = %rule.rule_id, vendor = %rule.vendor_contains, "rule created from review");
        Ok(rule)
    }

    pub fn decline(self) {}
}

/// A client's transactions as last confirmed by the backend.
#[derive(Debug, Clone)]
pub struct TransactionReview {
    pub client: Client,
    pub transactions: Vec<Transaction>,
}

impl TransactionReview {
    pub async fn load(api: &ApiClient, client: &Client) -> Result<Self> {
        let transactions = api.client_transactions(&client.id).await?;
        Ok(Self {
            client: client.clone(),
            transactions,
        })
    }

    pub fn get(&self, transaction_id: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
    }

    fn position(&self, transaction_id: &str) -> Result<usize> {
        self.transactions
            .iter()
            .position(|t| t.transaction_id == transaction_id)
            .ok_or_else(|| BookdeskError::UnknownTransaction(transaction_id.to_string()))
    }

    /// Transactions still waiting for approval, in backend order.
    pub fn awaiting_approval(&self) -> Vec<&Transaction> {
        self.transactions.iter().filter(|t| !t.approved).collect()
    }

    pub fn counts(&self) -> ReviewCounts {
        let approved = self.transactions.iter().filter(|t| t.approved).count();
        ReviewCounts {
            approved,
            pending: self.transactions.len() - approved,
            pushed: self.transactions.iter().filter(|t| t.is_exported()).count(),
        }
    }

    /// Store `label` as the transaction's manual category. Approval is left
    /// as it is. The label must come from `categories`, resolved for this
    /// review's client; otherwise nothing is sent.
    pub async fn assign_manual_category(
        &mut self,
        api: &ApiClient,
        categories: &CategoryList,
        transaction_id: &str,
        label: &str,
    ) -> Result<RuleOffer> {
        if categories.client_id != self.client.id {
            return Err(BookdeskError::Validation(format!(
                "Categories were loaded for another client ({})",
                categories.client_id
            )));
        }
        if !categories.contains(label) {
            return Err(BookdeskError::UnknownCategory(label.to_string()));
        }
        let idx = self.position(transaction_id)?;

        let update = TransactionUpdate {
            manual_category: Some(label.to_string()),
            approved: None,
        };
        let confirmed = api.update_transaction(transaction_id, &update).await?;
        info!(transaction = transaction_id, category = label, "manual category set");
        let vendor = confirmed.vendor_name.clone();
        self.transactions[idx] = confirmed;

        Ok(RuleOffer {
            client_id: self.client.id.clone(),
            vendor_contains: vendor,
            map_to_account: label.to_string(),
        })
    }

    /// Flip approval. No category is required.
    pub async fn toggle_approval(&mut self, api: &ApiClient, transaction_id: &str) -> Result<&Transaction> {
        let idx = self.position(transaction_id)?;
        let update = TransactionUpdate {
            manual_category: None,
            approved: Some(!self.transactions[idx].approved),
        };
        let confirmed = api.update_transaction(transaction_id, &update).await?;
        info!(transaction = transaction_id, approved = confirmed.approved, "approval toggled");
        self.transactions[idx] = confirmed;
        Ok(&self.transactions[idx])
    }
}
