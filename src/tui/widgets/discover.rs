use ratatui::widgets::canvas::{Canvas, Map, MapResolution};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget, Wrap};
use ratatui::style::{Color, Modifier, Style};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};

use crate::models::GeoLocation;
use crate::places::{EcoPlace, Places};
use crate::tui::widgets::cards::{render_stat_cards, StatCard};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color, place_category_color};
use crate::utils::{format_kg, format_key_binding_for_display as key, truncate};
use crate::Config;

/// Heart for saved places, blank otherwise
fn like_marker(liked: bool) -> &'static str {
    if liked { "♥ " } else { "  " }
}

pub fn render_discover(
    f: &mut Frame,
    area: Rect,
    places: &Places,
    location: Option<&GeoLocation>,
    list_state: &mut ListState,
    config: &Config,
) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);

    let [cards_area, filter_area, body_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(6),
    ])
    .areas(area);

    let stats = places.stats();
    render_stat_cards(
        f,
        cards_area,
        &[
            StatCard::new("Total Places", stats.total.to_string()),
            StatCard::new("Saved", stats.saved.to_string()),
            StatCard::new("Avg Rating", format!("★ {:.1}", stats.average_rating)),
            StatCard::new("CO₂ Saved", format_kg(stats.co2_saved_kg)).accent(Color::Green),
        ],
        config,
    );

    let category = places.filter.category.map(|c| c.label()).unwrap_or("All");
    let mut filter_spans = vec![Span::styled(
        format!(" Category: {} ({})", category, key(&config.key_bindings.filter)),
        Style::default().fg(fg_color),
    )];
    if !places.filter.query.is_empty() {
        filter_spans.push(Span::styled(
            format!("   Search: \"{}\"", places.filter.query),
            Style::default().fg(fg_color).add_modifier(Modifier::ITALIC),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(filter_spans)), filter_area);

    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(body_area);
    let [details_area, map_area] =
        Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(side_area);

    let visible = places.visible();
    render_place_list(f, list_area, places, &visible, list_state, config);

    let selected = list_state.selected().and_then(|i| visible.get(i).copied());
    render_place_details(f, details_area, selected, places, config);
    render_map(f, map_area, location, config);
}

fn render_place_list(
    f: &mut Frame,
    area: Rect,
    places: &Places,
    visible: &[&'static EcoPlace],
    list_state: &mut ListState,
    config: &Config,
) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);
    let title = format!("Eco-Friendly Places ({})", visible.len());

    if visible.is_empty() {
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("No places found", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("Try adjusting your search or filters"),
        ])
        .alignment(Alignment::Center)
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, area);
        return;
    }

    let max_width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = visible
        .iter()
        .map(|place| {
            let liked = places.is_liked(place.id);
            let heart = Span::styled(like_marker(liked), Style::default().fg(Color::Red));
            let badge = Span::styled(
                format!("[{}] ", place.category.label()),
                Style::default().fg(place_category_color(&theme, place.category)),
            );
            let name = truncate(place.name, max_width.saturating_sub(14));
            let meta = format!(
                "    {} km · ★ {:.1} ({}) · saves {}",
                crate::utils::format_number(place.distance_km),
                place.rating,
                place.reviews,
                format_kg(place.co2_saved_kg)
            );
            ListItem::new(vec![
                Line::from(vec![heart, badge, Span::raw(name)]),
                Line::from(Span::styled(truncate(&meta, max_width), Style::default().add_modifier(Modifier::DIM))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));
    StatefulWidget::render(list, area, f.buffer_mut(), list_state);
}

fn render_place_details(f: &mut Frame, area: Rect, place: Option<&EcoPlace>, places: &Places, config: &Config) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let lines = match place {
        Some(place) => {
            let liked = places.is_liked(place.id);
            vec![
                Line::from(Span::styled(place.name, Style::default().add_modifier(Modifier::BOLD))),
                Line::from(""),
                Line::from(place.description),
                Line::from(""),
                Line::from(place.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ")),
                Line::from(""),
                Line::from(format!(
                    "{}: {}",
                    key(&config.key_bindings.like),
                    if liked { "Remove from saved" } else { "Save place" }
                )),
            ]
        }
        None => vec![Line::from("Select a place to see details")],
    };
    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(fg_color))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Details"));
    f.render_widget(paragraph, area);
}

fn render_map(f: &mut Frame, area: Rect, location: Option<&GeoLocation>, config: &Config) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);
    let title = match location {
        Some(loc) => format!(
            "Your Location: {}",
            loc.address.clone().unwrap_or_else(|| format!("{:.4}, {:.4}", loc.lat, loc.lng))
        ),
        None => format!("Map ({}: find location)", key(&config.key_bindings.locate)),
    };
    let marker = location.map(|l| (l.lng, l.lat));

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title).style(Style::default().fg(fg_color)))
        .x_bounds([-180.0, 180.0])
        .y_bounds([-90.0, 90.0])
        .paint(move |ctx| {
            ctx.draw(&Map {
                resolution: MapResolution::Low,
                color: Color::DarkGray,
            });
            if let Some((x, y)) = marker {
                ctx.layer();
                ctx.print(x, y, Span::styled("●", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)));
            }
        });
    f.render_widget(canvas, area);
}
