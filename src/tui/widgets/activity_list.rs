use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget};
use ratatui::style::{Modifier, Style};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};

use crate::models::{Activity, Category, Summary};
use crate::tui::widgets::cards::{render_stat_cards, StatCard};
use crate::tui::widgets::color::{category_color, get_contrast_text_color, parse_color};
use crate::utils::{format_kg, format_key_binding_for_display, parse_timestamp, truncate};
use crate::Config;

/// "YYYY-MM-DD" of an activity, or the raw timestamp if it does not parse
pub fn display_date(activity: &Activity) -> String {
    parse_timestamp(&activity.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| truncate(&activity.timestamp, 10))
}

pub struct ActivityListView<'a> {
    pub summary: &'a Summary,
    pub activities: &'a [&'a Activity],
    pub total_count: usize,
    pub filter: Option<Category>,
    pub query: &'a str,
}

pub fn render_activity_list(f: &mut Frame, area: Rect, view: &ActivityListView, list_state: &mut ListState, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = if active_theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&active_theme.highlight_fg)
    };

    let [cards_area, filter_area, list_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(3),
    ])
    .areas(area);

    render_stat_cards(
        f,
        cards_area,
        &[
            StatCard::new("Total Emissions", format_kg(view.summary.total_emissions_kg)),
            StatCard::new("Activities Logged", view.summary.activities_logged.to_string()),
            StatCard::new("Average Impact", format_kg(view.summary.average_kg)),
        ],
        config,
    );

    let filter_label = view.filter.map(|c| c.label()).unwrap_or("All");
    let mut filter_spans = vec![Span::styled(
        format!(" Category: {} ({})", filter_label, format_key_binding_for_display(&config.key_bindings.filter)),
        Style::default().fg(fg_color),
    )];
    if !view.query.is_empty() {
        filter_spans.push(Span::styled(
            format!("   Search: \"{}\"", view.query),
            Style::default().fg(fg_color).add_modifier(Modifier::ITALIC),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(filter_spans)), filter_area);

    let title = format!("Activity History ({} of {})", view.activities.len(), view.total_count);
    if view.activities.is_empty() {
        let hint = if view.total_count == 0 {
            format!("No activities yet. Press {} to log one.", format_key_binding_for_display(&config.key_bindings.new))
        } else {
            "No activities match the current filter".to_string()
        };
        let paragraph = Paragraph::new(vec![Line::from(""), Line::from(hint)])
            .alignment(Alignment::Center)
            .style(Style::default().fg(fg_color))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, list_area);
        return;
    }

    // Leave room for borders and padding
    let max_width = list_area.width.saturating_sub(5) as usize;
    let items: Vec<ListItem> = view
        .activities
        .iter()
        .map(|activity| {
            let marker = Span::styled("● ", Style::default().fg(category_color(&active_theme, activity.category)));
            let first = format!(
                "{}  {:<9} {}  {}",
                display_date(activity),
                activity.category.label(),
                activity.kind,
                activity.quantity_label()
            );
            let co2 = format!("  {} CO₂", format_kg(activity.emission()));
            let first = truncate(&first, max_width.saturating_sub(co2.chars().count() + 2));
            let mut lines = vec![Line::from(vec![marker, Span::raw(first), Span::styled(co2, Style::default().add_modifier(Modifier::BOLD))])];
            if let Some(notes) = activity.notes.as_deref().filter(|n| !n.is_empty()) {
                lines.push(Line::from(Span::styled(
                    format!("    {}", truncate(notes, max_width.saturating_sub(4))),
                    Style::default().add_modifier(Modifier::DIM),
                )));
            }
            ListItem::new(lines)
        })
        .collect();
    let total_items = items.len();

    let list_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(list_area);

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));
    StatefulWidget::render(list, list_areas[0], f.buffer_mut(), list_state);

    let visible_items = list_areas[0].height.saturating_sub(2) as usize;
    if total_items > visible_items && list_areas[1].width > 0 && list_areas[0].height > 2 {
        let scrollbar_area = Rect::new(
            list_areas[1].x,
            list_areas[0].y + 1,
            list_areas[1].width,
            list_areas[0].height.saturating_sub(2),
        );
        let mut scrollbar_state = ScrollbarState::new(total_items)
            .viewport_content_length(visible_items)
            .position(list_state.selected().unwrap_or(0));
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(timestamp: &str) -> Activity {
        Activity {
            id: "1".to_string(),
            category: Category::Energy,
            kind: "Electricity".to_string(),
            distance_km: None,
            usage: Some(12.0),
            unit: Some("kWh".to_string()),
            servings: None,
            co2_kg: 4.8,
            timestamp: timestamp.to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_display_date_falls_back_to_raw_text() {
        assert_eq!(display_date(&activity("someday")), "someday");
        assert_eq!(display_date(&activity("2025-03-02T12:00:00Z")).len(), 10);
    }
}
