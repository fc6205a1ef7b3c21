//! Vendor → account rules for one client. Matching runs in the backend; this
//! side only keeps the records, and re-lists after every change because
//! `match_count` is maintained server-side.

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{BookdeskError, Result};
use crate::models::{NewRule, Rule, RuleUpdate};

pub struct RuleBook {
    pub client_id: String,
    pub rules: Vec<Rule>,
    /// Set when a change went through but the re-list after it failed;
    /// `rules` then holds the local patch and stale match counts.
    pub stale: bool,
}

impl RuleBook {
    pub fn new(client_id: &str, rules: Vec<Rule>) -> Self {
        Self {
            client_id: client_id.to_string(),
            rules,
            stale: false,
        }
    }

    pub async fn load(api: &ApiClient, client_id: &str) -> Result<Self> {
        let rules = api.list_rules(client_id).await?;
        Ok(Self::new(client_id, rules))
    }

    pub async fn reload(&mut self, api: &ApiClient) -> Result<()> {
        self.rules = api.list_rules(&self.client_id).await?;
        self.stale = false;
        Ok(())
    }

    /// Re-list after a committed change. A failure here does not undo the
    /// change, so it is logged and the book is marked stale instead.
    async fn refresh_after_change(&mut self, api: &ApiClient) {
        if let Err(e) = self.reload(api).await {
            warn!(client = %self.client_id, error = %e, "rule list refresh failed");
            self.stale = true;
        }
    }

    fn patch_local(&mut self, rule: &Rule) {
        match self.rules.iter_mut().find(|r| r.rule_id == rule.rule_id) {
            Some(existing) => *existing = rule.clone(),
            None => self.rules.push(rule.clone()),
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    /// Case-insensitive match on the vendor pattern or mapped account.
    pub fn search(&self, term: &str) -> Vec<&Rule> {
        let term = term.trim().to_lowercase();
        self.rules
            .iter()
            .filter(|r| {
                term.is_empty()
                    || r.vendor_contains.to_lowercase().contains(&term)
                    || r.map_to_account.to_lowercase().contains(&term)
            })
            .collect()
    }

    pub async fn create(
        &mut self,
        api: &ApiClient,
        vendor_contains: &str,
        map_to_account: &str,
    ) -> Result<Rule> {
        let vendor_contains = vendor_contains.trim();
        let map_to_account = map_to_account.trim();
        if vendor_contains.is_empty() || map_to_account.is_empty() {
            return Err(BookdeskError::Validation(
                "Both a vendor pattern and an account are required".to_string(),
            ));
        }
        let rule = api
            .create_rule(&NewRule {
                client_id: self.client_id.clone(),
                vendor_contains: vendor_contains.to_string(),
                map_to_account: map_to_account.to_string(),
            })
            .await?;
        info!(rule = %rule.rule_id, "rule created");
        self.patch_local(&rule);
        self.refresh_after_change(api).await;
        Ok(rule)
    }

    pub async fn update(&mut self, api: &ApiClient, rule_id: &str, update: RuleUpdate) -> Result<Rule> {
        if update == RuleUpdate::default() {
            return Err(BookdeskError::Validation("Nothing to update".to_string()));
        }
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&update.vendor_contains) || blank(&update.map_to_account) {
            return Err(BookdeskError::Validation(
                "Vendor pattern and account cannot be empty".to_string(),
            ));
        }
        self.require(rule_id)?;
        let rule = api.update_rule(rule_id, &update).await?;
        info!(rule = rule_id, "rule updated");
        self.patch_local(&rule);
        self.refresh_after_change(api).await;
        Ok(rule)
    }

    /// Flip `active`. Only the flag is sent, so pattern and account stay put.
    pub async fn toggle_active(&mut self, api: &ApiClient, rule_id: &str) -> Result<Rule> {
        let active = self.require(rule_id)?.active;
        let update = RuleUpdate {
            active: Some(!active),
            ..Default::default()
        };
        let rule = api.update_rule(rule_id, &update).await?;
        info!(rule = rule_id, active = !active, "rule toggled");
        self.patch_local(&rule);
        self.refresh_after_change(api).await;
        Ok(rule)
    }

    pub async fn delete(&mut self, api: &ApiClient, rule_id: &str) -> Result<()> {
        self.require(rule_id)?;
        api.delete_rule(rule_id).await?;
        info!(rule = rule_id, "rule deleted");
        self.rules.retain(|r| r.rule_id != rule_id);
        self.refresh_after_change(api).await;
        Ok(())
    }

    fn require(&self, rule_id: &str) -> Result<&Rule> {
        self.get(rule_id)
            .ok_or_else(|| BookdeskError::UnknownRule(rule_id.to_string()))
    }
}
