use ratatui::widgets::{Paragraph, Tabs};
use ratatui::style::{Style, Modifier};
use ratatui::text::{Line, Span};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use crate::tui::app::Tab;
use crate::Config;
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};

/// Tab caption prefixed with its jump key, e.g. "1 Dashboard"
pub fn tab_caption(tab: Tab) -> String {
    format!("{} {}", tab.index() + 1, tab.title())
}

pub fn render_tabs(f: &mut Frame, area: Rect, current_tab: Tab, user_name: Option<&str>, config: &Config) {
    let theme = config.get_active_theme();
    let tab_bg = parse_color(&theme.tab_bg);
    let selected_bg = parse_color(&theme.highlight_bg);
    let box_style = Style::default().fg(get_contrast_text_color(tab_bg)).bg(tab_bg);

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|tab| {
            Line::from(vec![
                Span::styled(" ", box_style),
                Span::styled(tab_caption(*tab), box_style),
                Span::styled(" ", box_style),
            ])
        })
        .collect();

    let user_label = user_name
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("Signed in as {} ", n))
        .unwrap_or_default();
    let [tabs_area, user_area] = Layout::horizontal([
        Constraint::Min(1),
        Constraint::Length(user_label.chars().count() as u16),
    ])
    .areas(area);

    let tabs = Tabs::new(titles)
        .select(current_tab.index())
        .style(Style::default().fg(parse_color(&theme.fg)).bg(parse_color(&theme.bg)))
        .highlight_style(
            Style::default()
                .fg(get_contrast_text_color(selected_bg))
                .bg(selected_bg)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" ")
        .padding("", "");
    f.render_widget(tabs, tabs_area);

    if !user_label.is_empty() {
        let user = Paragraph::new(Span::styled(user_label, Style::default().add_modifier(Modifier::DIM)))
            .alignment(Alignment::Right);
        f.render_widget(user, user_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captions_carry_jump_keys() {
        assert_eq!(tab_caption(Tab::Dashboard), "1 Dashboard");
        assert_eq!(tab_caption(Tab::Profile), "5 Profile");
    }
}
