use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::DefaultTerminal;

use crate::error::Result;
use crate::fmt::money;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const STATUS_STYLE: Style = Style::new().fg(Color::Yellow);
pub const ERROR_STYLE: Style = Style::new().fg(Color::Red);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

pub const APPROVED_STYLE: Style = Style::new().fg(Color::Green);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

/// Format an amount as a colored Span (green for deposits, red for charges).
/// Shows absolute value; color conveys the sign.
pub fn money_span(amount: f64) -> Span<'static> {
    let style = if amount < 0.0 {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(money(amount.abs()), style)
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Terminal in raw/alternate-screen mode, restored on drop and on panic.
pub struct Screen {
    pub terminal: DefaultTerminal,
    events: EventStream,
}

impl Screen {
    pub fn enter() -> Self {
        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            ratatui::restore();
            hook(info);
        }));
        Self {
            terminal: ratatui::init(),
            events: EventStream::new(),
        }
    }

    /// Next key press. `None` on Ctrl+C or when the event stream ends.
    pub async fn next_key(&mut self) -> Result<Option<KeyEvent>> {
        while let Some(event) = self.events.next().await {
            if let Event::Key(key) = event? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    return Ok(None);
                }
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_span_uses_sign_for_color() {
        let neg = money_span(-12.5);
        assert_eq!(neg.content, "$12.50");
        assert_eq!(neg.style, AMOUNT_NEG_STYLE);
        assert_eq!(money_span(3.0).style, AMOUNT_POS_STYLE);
    }

    #[test]
    fn test_wrap_text_counts_lines() {
        let (wrapped, lines) = wrap_text("vendor contains STAPLES maps to Office Supplies", 16);
        assert!(lines >= 3);
        assert!(wrapped.lines().all(|l| l.chars().count() <= 16));
        assert_eq!(wrap_text("x", 0), ("x".to_string(), 1));
    }
}
