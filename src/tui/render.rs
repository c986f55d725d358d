use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout as RatLayout};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use crate::tui::app::{Mode, Tab};
use crate::tui::{App, Layout};
use crate::tui::widgets::{
    activity_list::{render_activity_list, ActivityListView},
    chat::render_chat,
    color::parse_color,
    confirm_delete::render_confirm_delete,
    dashboard::render_dashboard,
    discover::render_discover,
    form::render_form,
    help::render_help,
    input::render_input,
    profile::render_profile,
    status_bar::render_status_bar,
    tabs::render_tabs,
};
use crate::utils::format_key_binding_for_display as key;

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("EcoTrack")
        .title_alignment(Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    if app.ui.mode == Mode::Auth {
        render_auth(f, app, layout);
    } else {
        let user_name = app.session.user().map(|u| u.name.as_str());
        render_tabs(f, layout.tabs_area, app.ui.current_tab, user_name, &app.config);
        render_page(f, app, layout);

        if let Some(form) = app.form.active.as_mut() {
            render_form(f, layout.main_area, form, &app.config);
        }
        if app.ui.mode == Mode::Help {
            render_help(f, f.area(), &app.config);
        }
        if let Some(ref activity) = app.modals.delete_confirmation {
            render_confirm_delete(f, f.area(), activity, app.modals.delete_modal_selection, &app.config);
        }
    }

    let key_hints = get_key_hints(app);
    render_status_bar(
        f,
        layout.status_area,
        app.status.message.as_ref(),
        &key_hints,
        app.is_loading(),
        &app.config,
    );
}

fn render_auth(f: &mut Frame, app: &mut App, layout: &Layout) {
    let [banner_area, form_area] =
        RatLayout::vertical([Constraint::Length(3), Constraint::Min(8)]).areas(layout.main_area);
    let banner = Paragraph::new(vec![
        Line::from(Span::styled("EcoTrack", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("Track your carbon footprint and discover greener habits"),
    ])
    .alignment(Alignment::Center);
    f.render_widget(banner, banner_area);

    if let Some(form) = app.form.active.as_mut() {
        render_form(f, form_area, form, &app.config);
    }
}

fn render_page(f: &mut Frame, app: &mut App, layout: &Layout) {
    let mut area = layout.main_area;

    // The search box sits under the page it filters
    if app.ui.mode == Mode::Search {
        let [page, search] = RatLayout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(area);
        area = page;
        render_input(f, search, &mut app.search.input, "Search", "type to filter", true, &app.config);
    }

    match app.ui.current_tab {
        Tab::Dashboard => {
            let goal = app.goal_progress();
            render_dashboard(f, area, app.activities.summary(), &app.report, &goal, &app.config);
        }
        Tab::Activities => {
            // Field-level borrows so the list state can be borrowed mutably below
            let query = &app.search.activity_query;
            let visible: Vec<_> = app
                .activities
                .filtered(app.search.activity_filter)
                .into_iter()
                .filter(|a| a.matches_search(query))
                .collect();
            let view = ActivityListView {
                summary: app.activities.summary(),
                activities: &visible,
                total_count: app.activities.history().len(),
                filter: app.search.activity_filter,
                query: &app.search.activity_query,
            };
            render_activity_list(f, area, &view, &mut app.ui.activity_list_state, &app.config);
        }
        Tab::Discover => {
            render_discover(
                f,
                area,
                &app.discover.places,
                app.discover.location.as_ref(),
                &mut app.ui.place_list_state,
                &app.config,
            );
        }
        Tab::Assistant => {
            let focused = app.ui.mode == Mode::Chat;
            render_chat(f, area, &mut app.chat, focused, &app.config);
        }
        Tab::Profile => {
            let goal = app.goal_progress();
            render_profile(f, area, app.session.user(), &goal, app.client.base_url(), &app.config);
        }
    }
}

pub fn get_key_hints(app: &App) -> Vec<String> {
    let kb = &app.config.key_bindings;
    if app.modals.delete_confirmation.is_some() {
        return vec!["↑/↓: Choose".to_string(), "Enter: Confirm".to_string(), "Esc: Cancel".to_string()];
    }
    match app.ui.mode {
        Mode::Help => vec![format!("Esc or {}: Exit help", key(&kb.help))],
        Mode::Search => vec!["Enter: Keep filter".to_string(), "Esc: Clear search".to_string()],
        Mode::Chat => vec!["Enter: Send".to_string(), "Esc: Stop typing".to_string()],
        Mode::Auth | Mode::Form => {
            let mut hints = vec![
                "Tab/Shift+Tab: Next/prev field".to_string(),
                format!("{}: Submit", key(&kb.submit)),
            ];
            if app.form.active.as_ref().and_then(|f| f.fields.get(f.current)).is_some_and(|f| f.is_choice()) {
                hints.push("←/→: Change option".to_string());
            }
            if app.ui.mode == Mode::Auth {
                hints.push("Ctrl+N: Log in / Sign up".to_string());
                hints.push("Esc: Quit".to_string());
            } else {
                hints.push("Esc: Cancel".to_string());
            }
            hints
        }
        Mode::View => {
            let mut hints = vec![format!("{}: Quit", key(&kb.quit))];
            match app.ui.current_tab {
                Tab::Dashboard => {
                    hints.push(format!("{}: Log activity", key(&kb.new)));
                    hints.push(format!("{}: Refresh", key(&kb.refresh)));
                }
                Tab::Activities => {
                    hints.push(format!("{}: Log activity", key(&kb.new)));
                    hints.push(format!("{}: Delete", key(&kb.delete)));
                    hints.push(format!("{}: Filter", key(&kb.filter)));
                    hints.push(format!("{}: Search", key(&kb.search)));
                }
                Tab::Discover => {
                    hints.push(format!("{}: Save place", key(&kb.like)));
                    hints.push(format!("{}: Filter", key(&kb.filter)));
                    hints.push(format!("{}: Search", key(&kb.search)));
                    hints.push(format!("{}: Locate", key(&kb.locate)));
                }
                Tab::Assistant => {
                    hints.push(format!("{}: Type message", key(&kb.select)));
                    hints.push(format!("{}: New chat", key(&kb.new)));
                    hints.push(format!("{}: Copy reply", key(&kb.copy)));
                }
                Tab::Profile => {
                    hints.push("e: Edit".to_string());
                    hints.push("p: Password".to_string());
                    hints.push("t: Theme".to_string());
                    hints.push(format!("{}: Log out", key(&kb.logout)));
                }
            }
            hints.push(format!("{}: Help", key(&kb.help)));
            hints
        }
    }
}
