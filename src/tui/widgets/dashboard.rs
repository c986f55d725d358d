use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, LegendPosition, Paragraph, Wrap};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};

use crate::aggregation::{self, EmissionsReport, GoalProgress, NATIONAL_DAILY_AVERAGE_KG};
use crate::models::{Category, Summary};
use crate::tui::widgets::cards::{render_stat_cards, StatCard};
use crate::tui::widgets::color::{category_color, parse_color};
use crate::utils::{format_kg, format_key_binding_for_display};
use crate::Config;

const CHART_CATEGORIES: [Category; 3] = [Category::Transport, Category::Energy, Category::Food];

pub fn render_dashboard(
    f: &mut Frame,
    area: Rect,
    summary: &Summary,
    report: &EmissionsReport,
    goal: &GoalProgress,
    config: &Config,
) {
    let theme = config.get_active_theme();

    let [cards_area, charts_area, bottom_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(6),
        Constraint::Length(5),
    ])
    .areas(area);

    render_stat_cards(
        f,
        cards_area,
        &[
            StatCard::new("Total CO₂", format_kg(summary.total_emissions_kg)),
            StatCard::new("Transport", format_kg(report.totals.transport))
                .accent(category_color(&theme, Category::Transport)),
            StatCard::new("Food", format_kg(report.totals.food)).accent(category_color(&theme, Category::Food)),
            StatCard::new("Energy", format_kg(report.totals.energy)).accent(category_color(&theme, Category::Energy)),
        ],
        config,
    );

    if report.is_empty() {
        render_empty_state(f, charts_area, config);
    } else {
        let [chart_area, breakdown_area] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(charts_area);
        render_weekly_chart(f, chart_area, report, config);
        render_breakdown(f, breakdown_area, report, config);
    }

    let [goal_area, comparison_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(bottom_area);
    render_goal(f, goal_area, goal, config);
    render_comparison(f, comparison_area, report, config);
}

fn render_empty_state(f: &mut Frame, area: Rect, config: &Config) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No activities logged yet", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(format!(
            "Press {} to log your first activity",
            format_key_binding_for_display(&config.key_bindings.new)
        )),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title("Weekly Carbon Emissions"));
    f.render_widget(paragraph, area);
}

/// (x, kg) points per category, x being the bucket index
pub fn chart_points(report: &EmissionsReport, category: Category) -> Vec<(f64, f64)> {
    report
        .series
        .iter()
        .enumerate()
        .map(|(i, bucket)| (i as f64, bucket.by_category.get(category)))
        .collect()
}

fn render_weekly_chart(f: &mut Frame, area: Rect, report: &EmissionsReport, config: &Config) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);

    let points: Vec<(Category, Vec<(f64, f64)>)> = CHART_CATEGORIES
        .iter()
        .map(|c| (*c, chart_points(report, *c)))
        .collect();

    let datasets: Vec<Dataset> = points
        .iter()
        .map(|(category, data)| {
            Dataset::default()
                .name(category.label())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(category_color(&theme, *category)))
                .data(data)
        })
        .collect();

    // A single day still needs a non-zero x range
    let x_max = (report.series.len().saturating_sub(1)).max(1) as f64;
    let y_max = (report.peak() * 1.1).max(1.0);

    let x_labels: Vec<String> = match report.series.as_slice() {
        [] => Vec::new(),
        [only] => vec![only.label.clone()],
        [first, .., last] => {
            let middle = &report.series[report.series.len() / 2];
            vec![first.label.clone(), middle.label.clone(), last.label.clone()]
        }
    };
    let y_labels = vec![
        "0".to_string(),
        format!("{:.1}", y_max / 2.0),
        format!("{:.1}", y_max),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Weekly Carbon Emissions"))
        .style(Style::default().fg(fg_color))
        .legend_position(Some(LegendPosition::TopLeft))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(fg_color))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("kg CO₂")
                .style(Style::default().fg(fg_color))
                .bounds([0.0, y_max])
                .labels(y_labels),
        );
    f.render_widget(chart, area);
}

/// Text bar of `width` cells filled to `percent`
pub fn share_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn render_breakdown(f: &mut Frame, area: Rect, report: &EmissionsReport, config: &Config) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);
    let bar_width = (area.width as usize).saturating_sub(2 + 10 + 6).max(4);

    let mut lines = Vec::new();
    for (category, percent) in report.totals.shares() {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<10}", category.label()), Style::default().fg(fg_color)),
            Span::styled(share_bar(percent, bar_width), Style::default().fg(category_color(&theme, category))),
            Span::styled(format!(" {:>3.0}%", percent), Style::default().fg(fg_color)),
        ]));
        lines.push(Line::from(Span::styled(
            format!("          {}", format_kg(report.totals.get(category))),
            Style::default().fg(fg_color).add_modifier(Modifier::DIM),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from("No categorised emissions"));
    }
    let notes = breakdown_notes(report);
    if !notes.is_empty() {
        lines.push(Line::from(""));
    }
    for note in notes {
        lines.push(Line::from(Span::styled(note, Style::default().fg(fg_color).add_modifier(Modifier::DIM))));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Category Breakdown"))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

/// Totals the weekly chart cannot show
pub fn breakdown_notes(report: &EmissionsReport) -> Vec<String> {
    let mut notes = Vec::new();
    let earlier = report.earlier.sum();
    if earlier > 0.0 {
        notes.push(format!(
            "{} from before the last {} days",
            format_kg(earlier),
            aggregation::MAX_BUCKETS
        ));
    }
    if report.skipped > 0 {
        notes.push(format!("{} record(s) without a readable date", report.skipped));
    }
    notes
}

fn render_goal(f: &mut Frame, area: Rect, goal: &GoalProgress, config: &Config) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);
    let bar_color = if goal.exceeded {
        Color::Red
    } else if goal.percent >= 80 {
        Color::Yellow
    } else {
        Color::Green
    };

    let label = if goal.exceeded {
        format!("{} of {} this week · over by {}", format_kg(goal.used_kg), format_kg(goal.goal_kg), format_kg(goal.used_kg - goal.goal_kg))
    } else {
        format!("{} of {} this week · {} left", format_kg(goal.used_kg), format_kg(goal.goal_kg), format_kg(goal.remaining_kg))
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Goal Progress").style(Style::default().fg(fg_color)))
        .gauge_style(Style::default().fg(bar_color))
        .percent(goal.percent)
        .label(label);
    f.render_widget(gauge, area);
}

fn render_comparison(f: &mut Frame, area: Rect, report: &EmissionsReport, config: &Config) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let average = report.daily_average();
    let difference = aggregation::compare_to_national(average);

    let verdict = if report.series.is_empty() {
        Span::raw("Log activities to compare")
    } else if difference <= 0.0 {
        Span::styled(format!("{:.0}% below average", difference.abs()), Style::default().fg(Color::Green))
    } else {
        Span::styled(format!("{:.0}% above average", difference), Style::default().fg(Color::Red))
    };

    let lines = vec![
        Line::from(format!("You: {}/day", format_kg(average))),
        Line::from(format!("National: {}/day", format_kg(NATIONAL_DAILY_AVERAGE_KG))),
        Line::from(verdict),
    ];
    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title("Comparison"));
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    #[test]
    fn test_share_bar_widths() {
        assert_eq!(share_bar(50.0, 10), "█████░░░░░");
        assert_eq!(share_bar(0.0, 4), "░░░░");
        assert_eq!(share_bar(150.0, 4), "████");
    }

    fn activity(id: &str, category: Category, co2_kg: f64, timestamp: &str) -> crate::models::Activity {
        crate::models::Activity {
            id: id.to_string(),
            category,
            kind: "Bus".to_string(),
            distance_km: Some(5.0),
            usage: None,
            unit: None,
            servings: None,
            co2_kg,
            timestamp: timestamp.to_string(),
            notes: None,
        }
    }

    fn render_to_text(summary: &Summary, report: &EmissionsReport) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let goal = aggregation::goal_progress(0.0, 45.0);
        let config = Config::default();
        terminal
            .draw(|f| render_dashboard(f, f.area(), summary, report, &goal, &config))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_empty_history_shows_empty_state_without_chart() {
        let text = render_to_text(&Summary::default(), &EmissionsReport::default());
        assert!(text.contains("No activities logged yet"));
        assert!(!text.contains("Category Breakdown"));
        // Braille cells only come from the line chart
        assert!(!text.chars().any(|c| ('\u{2801}'..='\u{28FF}').contains(&c)));
    }

    #[test]
    fn test_history_replaces_empty_state_with_chart() {
        let records = vec![activity("a", Category::Transport, 2.0, "2025-03-02T10:00:00Z")];
        let report = aggregation::aggregate(&records);
        let text = render_to_text(&Summary::from_activities(&records), &report);
        assert!(!text.contains("No activities logged yet"));
        assert!(text.contains("Category Breakdown"));
    }

    #[test]
    fn test_breakdown_notes_name_undated_and_earlier_records() {
        assert!(breakdown_notes(&EmissionsReport::default()).is_empty());

        let mut records: Vec<_> = (1..=9)
            .map(|d| activity(&d.to_string(), Category::Energy, 1.0, &format!("2025-03-{:02}T12:00:00Z", d)))
            .collect();
        records.push(activity("x", Category::Energy, 1.0, "yesterday-ish"));
        let report = aggregation::aggregate_in(&records, &chrono::Utc);
        let notes = breakdown_notes(&report);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("2.0 kg from before the last 7 days"));
        assert_eq!(notes[1], "1 record(s) without a readable date");
    }

    #[test]
    fn test_chart_points_follow_series() {
        let report = EmissionsReport::default();
        assert!(chart_points(&report, Category::Energy).is_empty());
    }
}
