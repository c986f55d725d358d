use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::style::{Color, Modifier, Style};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};

use crate::aggregation::GoalProgress;
use crate::models::User;
use crate::tui::widgets::color::parse_color;
use crate::utils::{format_kg, format_key_binding_for_display as key};
use crate::Config;

fn field<'a>(label: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<28}", label), Style::default().add_modifier(Modifier::DIM)),
        Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
    ])
}

pub fn render_profile(
    f: &mut Frame,
    area: Rect,
    user: Option<&User>,
    goal: &GoalProgress,
    api_url: &str,
    config: &Config,
) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let [account_area, settings_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);

    let not_set = || "—".to_string();
    let mut account = vec![
        field("Full Name", user.map(|u| u.name.clone()).filter(|n| !n.is_empty()).unwrap_or_else(not_set)),
        field("Email", user.map(|u| u.email.clone()).filter(|e| !e.is_empty()).unwrap_or_else(not_set)),
        field("Weekly Carbon Goal (kg CO₂)", format_kg(goal.goal_kg)),
        Line::from(""),
        field("Emitted in the last 7 days", format_kg(goal.used_kg)),
    ];
    account.push(if goal.exceeded {
        Line::from(Span::styled(
            format!("Over your goal by {}", format_kg(goal.used_kg - goal.goal_kg)),
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::from(Span::styled(
            format!("{} left this week ({}% used)", format_kg(goal.remaining_kg), goal.percent),
            Style::default().fg(Color::Green),
        ))
    });

    f.render_widget(
        Paragraph::new(account)
            .style(Style::default().fg(fg_color))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Account")),
        account_area,
    );

    let settings = vec![
        field("Theme", config.current_theme.clone()),
        field("Server", api_url.to_string()),
        Line::from(""),
        Line::from("e: Edit profile"),
        Line::from("p: Change password"),
        Line::from("t: Next theme"),
        Line::from(format!("{}: Log out", key(&config.key_bindings.logout))),
        Line::from(""),
        Line::from(Span::styled("x: Delete account", Style::default().fg(Color::Red))),
    ];
    f.render_widget(
        Paragraph::new(settings)
            .style(Style::default().fg(fg_color))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Settings")),
        settings_area,
    );
}
