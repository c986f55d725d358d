use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::style::{Color, Modifier, Style};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::tui::widgets::color::parse_color;

/// A headline number with its caption
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    /// Accent for the value; theme foreground when None
    pub accent: Option<Color>,
}

impl StatCard {
    pub fn new(title: &'static str, value: String) -> Self {
        Self { title, value, accent: None }
    }

    pub fn accent(mut self, color: Color) -> Self {
        self.accent = Some(color);
        self
    }
}

/// Lay cards out side by side with equal widths
pub fn render_stat_cards(f: &mut Frame, area: Rect, cards: &[StatCard], config: &Config) {
    if cards.is_empty() {
        return;
    }
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);

    let constraints = vec![Constraint::Ratio(1, cards.len() as u32); cards.len()];
    let areas = Layout::horizontal(constraints).split(area);

    for (card, area) in cards.iter().zip(areas.iter()) {
        let value_style = Style::default()
            .fg(card.accent.unwrap_or(fg_color))
            .add_modifier(Modifier::BOLD);
        let paragraph = Paragraph::new(Line::from(Span::styled(card.value.clone(), value_style)))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(card.title)
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(fg_color)),
            );
        f.render_widget(paragraph, *area);
    }
}
