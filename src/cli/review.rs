use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{LineGauge, Paragraph, Wrap},
    Frame,
};

use crate::api::ApiClient;
use crate::categories::{CategoryList, CategoryResolver, EmptyAction, Resolution};
use crate::cli::Context;
use crate::error::Result;
use crate::models::Transaction;
use crate::reviewer::{ReviewState, RuleOffer, TransactionReview};
use crate::tui::{
    money_span, wrap_text, Screen, APPROVED_STYLE, ERROR_STYLE, FOOTER_STYLE, HEADER_STYLE,
    SELECTED_STYLE, STATUS_STYLE,
};

const DETAIL_LABEL_WIDTH: usize = 15;

enum ReviewStep {
    PickCategory,
    ConfirmRule,
}

#[derive(Debug, PartialEq)]
enum HandleResult {
    Continue,
    Categorize(String),
    ToggleApproval,
    AnswerOffer(bool),
    RefreshCategories,
    Done,
}

struct TransactionReviewer {
    review: TransactionReview,
    queue: Vec<String>,
    current_txn: usize,
    categories: CategoryList,
    category_note: Option<String>,
    step: ReviewStep,
    cat_query: String,
    cat_selection: usize,
    confirm_value: bool,
    offer: Option<RuleOffer>,
    status: Option<(String, bool)>,
}

impl TransactionReviewer {
    fn new(review: TransactionReview, queue: Vec<String>, resolution: Resolution) -> Self {
        let mut reviewer = Self {
            review,
            queue,
            current_txn: 0,
            categories: resolution.categories.clone(),
            category_note: None,
            step: ReviewStep::PickCategory,
            cat_query: String::new(),
            cat_selection: 0,
            confirm_value: false,
            offer: None,
            status: None,
        };
        reviewer.set_categories(resolution);
        reviewer
    }

    fn set_categories(&mut self, resolution: Resolution) {
        self.category_note = match (&resolution.problem, resolution.empty_action()) {
            (Some(problem), _) => Some(format!("{problem} (F5 to retry)")),
            (None, Some(EmptyAction::UploadCoa { .. })) => {
                Some("No chart of accounts uploaded; run `bookdesk coa upload` first".to_string())
            }
            (None, Some(EmptyAction::Skip)) => Some("No categories available".to_string()),
            (None, None) => None,
        };
        self.categories = resolution.categories;
        self.cat_selection = 0;
    }

    fn current(&self) -> Option<&Transaction> {
        self.queue
            .get(self.current_txn)
            .and_then(|id| self.review.get(id))
    }

    fn filtered_categories(&self) -> Vec<&str> {
        if self.cat_query.is_empty() {
            return vec![];
        }
        let q = self.cat_query.to_lowercase();
        self.categories
            .labels()
            .into_iter()
            .filter(|label| label.to_lowercase().contains(&q))
            .take(9)
            .collect()
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), false));
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status = Some((msg.into(), true));
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let Some(txn) = self.current() else {
            return;
        };
        let total = self.queue.len();
        let vendor_width = (area.width as usize).saturating_sub(DETAIL_LABEL_WIDTH + 1);
        let vendor_name = if txn.vendor_name.trim().is_empty() { "-" } else { &txn.vendor_name };
        let (vendor, vendor_lines) = wrap_text(vendor_name, vendor_width);

        let [header_area, progress_area, detail_area, interaction_area, status_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(8 + vendor_lines),
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .areas(area);

        let counts = self.review.counts();
        frame.render_widget(
            Paragraph::new(format!(
                " {}  \u{2022}  {} approved  {} pending  {} pushed  \u{2022}  {} categories ({})",
                self.review.client.name,
                counts.approved,
                counts.pending,
                counts.pushed,
                self.categories.len(),
                self.categories.source.label()
            ))
            .style(HEADER_STYLE),
            header_area,
        );

        let ratio = if total > 1 {
            self.current_txn as f64 / (total - 1) as f64
        } else {
            1.0
        };
        let gauge = LineGauge::default()
            .label(format!("{} of {}", self.current_txn + 1, total))
            .ratio(ratio)
            .filled_style(Style::default().fg(Color::Green).bold())
            .unfilled_style(Style::default().fg(Color::DarkGray))
            .line_set(ratatui::symbols::line::THICK);
        frame.render_widget(gauge, progress_area);

        let state = ReviewState::of(txn);
        let state_style = if state == ReviewState::Approved {
            APPROVED_STYLE
        } else {
            Style::default().fg(Color::Yellow)
        };
        let mut detail_lines = vec![
            Line::from(""),
            Line::from(format!("  Date:        {}", txn.date_display())),
        ];
        for (i, part) in vendor.lines().enumerate() {
            let label = if i == 0 { "  Vendor:" } else { "" };
            detail_lines.push(Line::from(format!("{label:<DETAIL_LABEL_WIDTH$}{part}")));
        }
        detail_lines.extend([
            Line::from(vec![Span::raw("  Amount:      "), money_span(txn.amount)]),
            Line::from(format!(
                "  Suggested:   {}",
                txn.auto_category.as_deref().unwrap_or("-")
            )),
            Line::from(format!(
                "  Category:    {}",
                txn.manual_category.as_deref().unwrap_or("-")
            )),
            Line::from(vec![
                Span::raw("  State:       "),
                Span::styled(state.label(), state_style),
            ]),
            Line::from(format!(
                "  QuickBooks:  {}",
                txn.qb_id.as_deref().unwrap_or("not pushed")
            )),
            Line::from(""),
        ]);
        frame.render_widget(Paragraph::new(detail_lines), detail_area);

        let interaction_lines: Vec<Line> = match &self.step {
            ReviewStep::PickCategory => {
                let mut lines = vec![Line::from(format!("  Category: {}\u{2588}", self.cat_query))];
                if let Some(note) = &self.category_note {
                    lines.push(Line::from(Span::styled(format!("    {note}"), STATUS_STYLE)));
                }
                let matches = self.filtered_categories();
                if !self.cat_query.is_empty() && matches.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "    (no matches)",
                        Style::default().fg(Color::DarkGray),
                    )));
                } else {
                    for (i, label) in matches.iter().enumerate() {
                        if i == self.cat_selection {
                            lines.push(Line::from(Span::styled(format!("  > {label}"), SELECTED_STYLE)));
                        } else {
                            lines.push(Line::from(format!("    {label}")));
                        }
                    }
                }
                lines
            }
            ReviewStep::ConfirmRule => {
                let (yes_style, no_style) = if self.confirm_value {
                    (Style::default().fg(Color::White).bg(Color::Blue), Style::default())
                } else {
                    (Style::default(), Style::default().fg(Color::White).bg(Color::Blue))
                };
                let prompt = self.offer.as_ref().map(|o| o.prompt()).unwrap_or_default();
                vec![Line::from(vec![
                    Span::raw(format!("  {prompt}  ")),
                    Span::styled(" Yes ", yes_style),
                    Span::raw("  "),
                    Span::styled(" No ", no_style),
                ])]
            }
        };
        frame.render_widget(
            Paragraph::new(interaction_lines).wrap(Wrap { trim: false }),
            interaction_area,
        );

        if let Some((msg, is_error)) = &self.status {
            let style = if *is_error { ERROR_STYLE } else { STATUS_STYLE };
            frame.render_widget(Paragraph::new(format!(" {msg}")).style(style), status_area);
        }

        let hints = match &self.step {
            ReviewStep::PickCategory => {
                "Type to filter, Enter=categorize, Tab=approve/unapprove, Left/Right=prev/next, F5=reload categories, Esc=quit"
            }
            ReviewStep::ConfirmRule => "y/n or Left/Right to toggle, Enter=confirm, Esc=no",
        };
        frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
    }

    fn handle_key(&mut self, code: KeyCode) -> HandleResult {
        match &self.step {
            ReviewStep::PickCategory => match code {
                KeyCode::Char(c) => {
                    self.cat_query.push(c);
                    self.cat_selection = 0;
                    HandleResult::Continue
                }
                KeyCode::Backspace => {
                    self.cat_query.pop();
                    self.cat_selection = 0;
                    HandleResult::Continue
                }
                KeyCode::Up => {
                    self.cat_selection = self.cat_selection.saturating_sub(1);
                    HandleResult::Continue
                }
                KeyCode::Down => {
                    let matches = self.filtered_categories();
                    if !matches.is_empty() {
                        self.cat_selection = (self.cat_selection + 1).min(matches.len() - 1);
                    }
                    HandleResult::Continue
                }
                KeyCode::Enter => {
                    let matches = self.filtered_categories();
                    if matches.is_empty() {
                        return HandleResult::Continue;
                    }
                    let sel = self.cat_selection.min(matches.len() - 1);
                    HandleResult::Categorize(matches[sel].to_string())
                }
                KeyCode::Tab => HandleResult::ToggleApproval,
                KeyCode::F(5) => HandleResult::RefreshCategories,
                KeyCode::Right | KeyCode::PageDown => {
                    self.move_to(self.current_txn + 1);
                    HandleResult::Continue
                }
                KeyCode::Left | KeyCode::PageUp => {
                    self.move_to(self.current_txn.saturating_sub(1));
                    HandleResult::Continue
                }
                KeyCode::Esc => {
                    if self.cat_query.is_empty() {
                        HandleResult::Done
                    } else {
                        self.cat_query.clear();
                        self.cat_selection = 0;
                        HandleResult::Continue
                    }
                }
                _ => HandleResult::Continue,
            },
            ReviewStep::ConfirmRule => match code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.confirm_value = true;
                    HandleResult::Continue
                }
                KeyCode::Char('n') | KeyCode::Char('N') => {
                    self.confirm_value = false;
                    HandleResult::Continue
                }
                KeyCode::Left | KeyCode::Right => {
                    self.confirm_value = !self.confirm_value;
                    HandleResult::Continue
                }
                KeyCode::Enter => HandleResult::AnswerOffer(self.confirm_value),
                KeyCode::Esc => HandleResult::AnswerOffer(false),
                _ => HandleResult::Continue,
            },
        }
    }

    fn move_to(&mut self, idx: usize) {
        if idx < self.queue.len() {
            self.current_txn = idx;
            self.cat_query.clear();
            self.cat_selection = 0;
            self.status = None;
        }
    }

    async fn categorize(&mut self, api: &ApiClient, label: &str) {
        let Some(id) = self.queue.get(self.current_txn).cloned() else {
            return;
        };
        match self
            .review
            .assign_manual_category(api, &self.categories, &id, label)
            .await
        {
            Ok(offer) => {
                self.set_status(format!("Categorized as {label}"));
                self.offer = Some(offer);
                self.confirm_value = false;
                self.step = ReviewStep::ConfirmRule;
            }
            Err(e) => self.set_error(e.message_or("Failed to update category")),
        }
        self.cat_query.clear();
        self.cat_selection = 0;
    }

    async fn answer_offer(&mut self, api: &ApiClient, accept: bool) {
        self.step = ReviewStep::PickCategory;
        let Some(offer) = self.offer.take() else {
            return;
        };
        if !accept {
            offer.decline();
            self.set_status("Tab to approve, Right for the next transaction");
            return;
        }
        match offer.accept(api).await {
            Ok(rule) => self.set_status(format!(
                "Rule added: '{}' \u{2192} {}",
                rule.vendor_contains, rule.map_to_account
            )),
            Err(e) => self.set_error(format!(
                "Category kept, rule not created: {}",
                e.message_or("Failed to create rule")
            )),
        }
    }

    async fn toggle_approval(&mut self, api: &ApiClient) {
        let Some(id) = self.queue.get(self.current_txn).cloned() else {
            return;
        };
        match self.review.toggle_approval(api, &id).await {
            Ok(txn) => {
                let approved = txn.approved;
                if approved {
                    self.set_status("Approved");
                    self.move_to(self.current_txn + 1);
                } else {
                    self.set_status("Approval removed");
                }
            }
            Err(e) => self.set_error(e.message_or("Failed to update approval")),
        }
    }
}

pub async fn run(ctx: &Context, query: &str, all: bool) -> Result<()> {
    let client = ctx.client(query).await?;
    let review = TransactionReview::load(&ctx.api, &client).await?;
    let queue: Vec<String> = if all {
        review.transactions.iter().map(|t| t.transaction_id.clone()).collect()
    } else {
        review
            .awaiting_approval()
            .iter()
            .map(|t| t.transaction_id.clone())
            .collect()
    };
    if queue.is_empty() {
        println!("Nothing to review for {}.", client.name);
        return Ok(());
    }

    let resolver = CategoryResolver::new(ctx.api.clone());
    let Some(resolution) = resolver.select_and_load(&client).await else {
        return Ok(());
    };
    println!("{} transactions to review", queue.len());

    let mut reviewer = TransactionReviewer::new(review, queue, resolution);
    let mut screen = Screen::enter();

    let result = loop {
        if let Err(e) = screen.terminal.draw(|frame| reviewer.draw(frame)) {
            break Err(e.into());
        }
        let key = match screen.next_key().await {
            Ok(Some(key)) => key,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };
        match reviewer.handle_key(key.code) {
            HandleResult::Continue => {}
            HandleResult::Categorize(label) => reviewer.categorize(&ctx.api, &label).await,
            HandleResult::ToggleApproval => reviewer.toggle_approval(&ctx.api).await,
            HandleResult::AnswerOffer(accept) => reviewer.answer_offer(&ctx.api, accept).await,
            HandleResult::RefreshCategories => {
                if let Some(resolution) = resolver.refresh().await {
                    reviewer.set_categories(resolution);
                    reviewer.set_status("Categories reloaded");
                }
            }
            HandleResult::Done => break Ok(()),
        }
    };
    drop(screen);

    let counts = reviewer.review.counts();
    match &result {
        Ok(()) => println!(
            "Review closed: {} approved, {} pending, {} pushed",
            counts.approved, counts.pending, counts.pushed
        ),
        Err(e) => eprintln!("Review error: {e}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{resolve, CategorySource};
    use crate::api::testing::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn review() -> TransactionReview {
        TransactionReview {
            client: serde_json::from_value(json!({"_id": "acme", "name": "Acme", "account_type": "desktop"}))
                .unwrap(),
            transactions: serde_json::from_value(json!([
                {"transaction_id": "T1", "vendor_name": "STAPLES", "amount": -20.0},
                {"transaction_id": "T2", "vendor_name": "SHELL", "amount": -45.0, "auto_category": "Fuel"}
            ]))
            .unwrap(),
        }
    }

    async fn reviewer(server: &MockServer) -> TransactionReviewer {
        Mock::given(method("GET"))
            .and(path("/coa/acme/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"Accnt. #": "6100", "Account": "Office Supplies"},
                {"Accnt. #": "6200", "Account": "Fuel"}
            ]})))
            .mount(server)
            .await;
        let r = review();
        let resolution = resolve(&client_for(&server.uri()), &r.client).await;
        TransactionReviewer::new(r, vec!["T1".into(), "T2".into()], resolution)
    }

    fn type_str(r: &mut TransactionReviewer, s: &str) {
        for c in s.chars() {
            r.handle_key(KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_filter_and_pick_category() {
        let server = MockServer::start().await;
        let mut r = reviewer(&server).await;
        assert_eq!(r.categories.source, CategorySource::CoaUpload);

        type_str(&mut r, "6");
        assert_eq!(r.filtered_categories().len(), 2);
        r.handle_key(KeyCode::Down);
        assert_eq!(
            r.handle_key(KeyCode::Enter),
            HandleResult::Categorize("6200 - Fuel".to_string())
        );
    }

    #[tokio::test]
    async fn test_enter_without_matches_does_nothing() {
        let server = MockServer::start().await;
        let mut r = reviewer(&server).await;
        type_str(&mut r, "zzz");
        assert_eq!(r.handle_key(KeyCode::Enter), HandleResult::Continue);
        assert_eq!(r.handle_key(KeyCode::Esc), HandleResult::Continue);
        assert!(r.cat_query.is_empty());
        assert_eq!(r.handle_key(KeyCode::Esc), HandleResult::Done);
    }

    #[tokio::test]
    async fn test_navigation_and_shortcuts() {
        let server = MockServer::start().await;
        let mut r = reviewer(&server).await;
        assert_eq!(r.handle_key(KeyCode::Tab), HandleResult::ToggleApproval);
        assert_eq!(r.handle_key(KeyCode::F(5)), HandleResult::RefreshCategories);
        r.handle_key(KeyCode::Right);
        assert_eq!(r.current().unwrap().transaction_id, "T2");
        r.handle_key(KeyCode::Right);
        assert_eq!(r.current_txn, 1);
        r.handle_key(KeyCode::Left);
        assert_eq!(r.current().unwrap().transaction_id, "T1");
    }

    #[tokio::test]
    async fn test_long_vendor_wraps_under_label() {
        let server = MockServer::start().await;
        let mut r = reviewer(&server).await;
        r.review.transactions[0].vendor_name = "AMAZON MARKETPLACE SELLER PAYMENTS SEATTLE WA".into();
        let mut terminal = ratatui::Terminal::new(ratatui::backend::TestBackend::new(40, 30)).unwrap();
        terminal.draw(|frame| r.draw(frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let rows: Vec<String> = (0..buffer.area.height)
            .map(|y| (0..buffer.area.width).map(|x| buffer[(x, y)].symbol()).collect())
            .collect();
        assert!(rows.iter().any(|row| row.starts_with("  Vendor:      AMAZON MARKETPLACE")));
        assert!(rows.iter().any(|row| row.starts_with("               SELLER PAYMENTS SEATTLE")));
        assert!(rows.iter().any(|row| row.starts_with("  Amount:")));
    }

    #[tokio::test]
    async fn test_categorize_then_decline_rule() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/transactions/T1"))
            .and(body_json(json!({"manual_category": "6100 - Office Supplies"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction_id": "T1", "vendor_name": "STAPLES", "amount": -20.0,
                "manual_category": "6100 - Office Supplies", "approved": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let mut r = reviewer(&server).await;

        r.categorize(&api, "6100 - Office Supplies").await;
        assert!(matches!(r.step, ReviewStep::ConfirmRule));
        assert_eq!(r.offer.as_ref().unwrap().vendor_contains, "STAPLES");
        assert_eq!(r.handle_key(KeyCode::Char('n')), HandleResult::Continue);
        assert_eq!(r.handle_key(KeyCode::Enter), HandleResult::AnswerOffer(false));

        r.answer_offer(&api, false).await;
        assert!(r.offer.is_none());
        assert!(matches!(r.step, ReviewStep::PickCategory));
        assert_eq!(
            r.current().unwrap().manual_category.as_deref(),
            Some("6100 - Office Supplies")
        );
        let posts = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|req| req.method.as_str() == "POST")
            .count();
        assert_eq!(posts, 0);
    }

    #[tokio::test]
    async fn test_failed_update_shows_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/transactions/T1"))
            .and(body_json(json!({"approved": true})))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "Transaction locked"})))
            .mount(&server)
            .await;
        let api = client_for(&server.uri());
        let mut r = reviewer(&server).await;

        r.toggle_approval(&api).await;
        assert_eq!(r.status, Some(("Transaction locked".to_string(), true)));
        assert!(!r.current().unwrap().approved);
        assert_eq!(r.current_txn, 0);
    }
}
