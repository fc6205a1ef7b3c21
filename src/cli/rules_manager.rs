use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::truncate;
use crate::models::Rule;
use crate::rules::RuleBook;
use crate::tui::{Screen as Terminal, ERROR_STYLE, FOOTER_STYLE, HEADER_STYLE, STATUS_STYLE};

#[derive(Debug, PartialEq)]
pub enum RulesAction {
    Continue,
    Close,
    Toggle(String),
    Delete(String),
}

enum Screen {
    List,
    Search,
    ConfirmDelete,
}

pub struct RulesManager {
    book: RuleBook,
    query: String,
    selection: usize,
    scroll_offset: usize,
    last_visible_rows: usize,
    screen: Screen,
    status_message: Option<(String, bool)>,
    status_ttl: u8,
    greeting: String,
}

impl RulesManager {
    pub fn new(book: RuleBook, greeting: &str) -> Self {
        Self {
            book,
            query: String::new(),
            selection: 0,
            scroll_offset: 0,
            last_visible_rows: 20,
            screen: Screen::List,
            status_message: None,
            status_ttl: 0,
            greeting: greeting.to_string(),
        }
    }

    fn visible(&self) -> Vec<&Rule> {
        self.book.search(&self.query)
    }

    fn selected(&self) -> Option<&Rule> {
        self.visible().get(self.selection).copied()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        self.selection = if len == 0 { 0 } else { self.selection.min(len - 1) };
        self.scroll_offset = self.scroll_offset.min(self.selection);
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep, content_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" {}", self.greeting)).style(HEADER_STYLE),
            header_area,
        );

        let sep_line = "\u{2501}".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let visible_height = content_area.height as usize;
        let data_rows = visible_height.saturating_sub(5);
        self.last_visible_rows = data_rows.max(1);

        let rules = self.visible();
        let title = if self.query.is_empty() {
            format!(" Vendor Rules ({})", rules.len())
        } else {
            format!(" Vendor Rules ({} of {})", rules.len(), self.book.rules.len())
        };
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(title, Style::default().add_modifier(Modifier::BOLD))),
        ];
        let search_line = match &self.screen {
            Screen::Search => format!("   Search: {}\u{2588}", self.query),
            _ if !self.query.is_empty() => format!("   Search: {}", self.query),
            _ => String::new(),
        };
        lines.push(Line::from(Span::styled(search_line, FOOTER_STYLE)));

        if rules.is_empty() {
            lines.push(Line::from(if self.book.rules.is_empty() {
                "   No rules for this client yet."
            } else {
                "   No rules match."
            }));
        } else {
            lines.push(Line::from(Span::styled(
                format!(
                    "   {:<28} {:<32} {:<8} {}",
                    "Vendor Contains", "Account", "Active", "Matches"
                ),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
            )));

            let end = (self.scroll_offset + data_rows).min(rules.len());
            for (i, rule) in rules.iter().enumerate().take(end).skip(self.scroll_offset) {
                let marker = if i == self.selection { " > " } else { "   " };
                let mut style = if i == self.selection {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                if !rule.active {
                    style = style.fg(Color::DarkGray);
                }
                lines.push(Line::from(Span::styled(
                    format!(
                        "{marker}{:<28} {:<32} {:<8} {}",
                        truncate(&rule.vendor_contains, 26),
                        truncate(&rule.map_to_account, 30),
                        if rule.active { "yes" } else { "no" },
                        rule.match_count
                    ),
                    style,
                )));
            }
        }

        if let Screen::ConfirmDelete = &self.screen {
            if let Some(rule) = self.selected() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!(
                        "   Delete rule '{}' \u{2192} {}? (y/n)",
                        rule.vendor_contains, rule.map_to_account
                    ),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }

        frame.render_widget(Paragraph::new(lines), content_area);

        if let Some((msg, is_error)) = &self.status_message {
            let style = if *is_error { ERROR_STYLE } else { STATUS_STYLE };
            frame.render_widget(Paragraph::new(format!(" {msg}")).style(style), hints_area);
        } else {
            let hints = match &self.screen {
                Screen::ConfirmDelete => " y=confirm  n=cancel",
                Screen::Search => " Type to search  Enter=done  Esc=clear",
                Screen::List => " Up/Down=navigate  t=enable/disable  d=delete  /=search  Esc=back",
            };
            frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
        }
    }

    fn set_status(&mut self, msg: String, is_error: bool) {
        self.status_message = Some((msg, is_error));
        self.status_ttl = 3;
    }

    fn ensure_visible(&mut self, visible_rows: usize) {
        if self.selection < self.scroll_offset {
            self.scroll_offset = self.selection;
        } else if self.selection >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selection + 1 - visible_rows;
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> RulesAction {
        if self.status_ttl > 0 {
            self.status_ttl -= 1;
            if self.status_ttl == 0 {
                self.status_message = None;
            }
        }

        match &self.screen {
            Screen::List => self.handle_list_key(code),
            Screen::Search => self.handle_search_key(code),
            Screen::ConfirmDelete => self.handle_delete_key(code),
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> RulesAction {
        match code {
            KeyCode::Up => {
                self.selection = self.selection.saturating_sub(1);
                self.ensure_visible(self.last_visible_rows);
            }
            KeyCode::Down => {
                let len = self.visible().len();
                if len > 0 {
                    self.selection = (self.selection + 1).min(len - 1);
                    self.ensure_visible(self.last_visible_rows);
                }
            }
            KeyCode::Char('t') | KeyCode::Char(' ') => {
                if let Some(rule) = self.selected() {
                    return RulesAction::Toggle(rule.rule_id.clone());
                }
            }
            KeyCode::Char('d') => {
                if self.selected().is_some() {
                    self.screen = Screen::ConfirmDelete;
                }
            }
            KeyCode::Char('/') => self.screen = Screen::Search,
            KeyCode::Char('q') | KeyCode::Esc => return RulesAction::Close,
            _ => {}
        }
        RulesAction::Continue
    }

    fn handle_search_key(&mut self, code: KeyCode) -> RulesAction {
        match code {
            KeyCode::Char(c) => self.query.push(c),
            KeyCode::Backspace => {
                self.query.pop();
            }
            KeyCode::Enter => self.screen = Screen::List,
            KeyCode::Esc => {
                self.query.clear();
                self.screen = Screen::List;
            }
            _ => {}
        }
        self.selection = 0;
        self.scroll_offset = 0;
        RulesAction::Continue
    }

    fn handle_delete_key(&mut self, code: KeyCode) -> RulesAction {
        match code {
            KeyCode::Char('y') => {
                self.screen = Screen::List;
                if let Some(rule) = self.selected() {
                    return RulesAction::Delete(rule.rule_id.clone());
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.screen = Screen::List;
            }
            _ => {}
        }
        RulesAction::Continue
    }
}

fn stale_note(book: &RuleBook) -> &'static str {
    if book.stale {
        " (list refresh failed; match counts may be out of date)"
    } else {
        ""
    }
}

pub async fn run(ctx: &Context, query: &str) -> Result<()> {
    let client = ctx.client(query).await?;
    let book = RuleBook::load(&ctx.api, &client.id).await?;
    let mut manager = RulesManager::new(book, &format!("Rules \u{2022} {}", client.name));
    let mut terminal = Terminal::enter();

    let result = loop {
        if let Err(e) = terminal.terminal.draw(|frame| manager.draw(frame)) {
            break Err(e.into());
        }
        let key = match terminal.next_key().await {
            Ok(Some(key)) => key,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };
        match manager.handle_key(key.code) {
            RulesAction::Continue => {}
            RulesAction::Close => break Ok(()),
            RulesAction::Toggle(rule_id) => {
                match manager.book.toggle_active(&ctx.api, &rule_id).await {
                    Ok(rule) => {
                        let state = if rule.active { "Enabled" } else { "Disabled" };
                        manager.set_status(
                            format!("{state} '{}'{}", rule.vendor_contains, stale_note(&manager.book)),
                            false,
                        );
                    }
                    Err(e) => manager.set_status(e.message_or("Failed to update rule"), true),
                }
                manager.clamp_selection();
            }
            RulesAction::Delete(rule_id) => {
                match manager.book.delete(&ctx.api, &rule_id).await {
                    Ok(()) => manager.set_status(format!("Rule deleted{}", stale_note(&manager.book)), false),
                    Err(e) => manager.set_status(e.message_or("Failed to delete rule"), true),
                }
                manager.clamp_selection();
            }
        }
    };
    drop(terminal);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> RulesManager {
        let rules: Vec<Rule> = serde_json::from_value(json!([
            {"rule_id": "r1", "vendor_contains": "STAPLES", "map_to_account": "Office Supplies", "match_count": 4},
            {"rule_id": "r2", "vendor_contains": "SHELL", "map_to_account": "Fuel", "active": false},
            {"rule_id": "r3", "vendor_contains": "ADOBE", "map_to_account": "Software"}
        ]))
        .unwrap();
        RulesManager::new(RuleBook::new("acme", rules), "Rules")
    }

    #[test]
    fn test_toggle_selected_rule() {
        let mut m = manager();
        m.handle_key(KeyCode::Down);
        assert_eq!(m.handle_key(KeyCode::Char('t')), RulesAction::Toggle("r2".into()));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut m = manager();
        assert_eq!(m.handle_key(KeyCode::Char('d')), RulesAction::Continue);
        assert_eq!(m.handle_key(KeyCode::Char('n')), RulesAction::Continue);
        assert_eq!(m.handle_key(KeyCode::Char('d')), RulesAction::Continue);
        assert_eq!(m.handle_key(KeyCode::Char('y')), RulesAction::Delete("r1".into()));
    }

    #[test]
    fn test_search_narrows_selection() {
        let mut m = manager();
        m.handle_key(KeyCode::Char('/'));
        for c in "soft".chars() {
            m.handle_key(KeyCode::Char(c));
        }
        m.handle_key(KeyCode::Enter);
        assert_eq!(m.visible().len(), 1);
        assert_eq!(m.handle_key(KeyCode::Char('t')), RulesAction::Toggle("r3".into()));
        assert_eq!(m.handle_key(KeyCode::Esc), RulesAction::Close);
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let mut m = manager();
        for _ in 0..10 {
            m.handle_key(KeyCode::Down);
        }
        assert_eq!(m.selection, 2);
        m.book.rules.truncate(1);
        m.clamp_selection();
        assert_eq!(m.selection, 0);
    }
}
