use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use ratatui::style::{Modifier, Style};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span, Text};
use ratskin::RatSkin;
use termimad::minimad::Text as MinimadText;
use std::cmp;

use crate::models::ChatMessage;
use crate::tui::app::ChatState;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::input::render_input;
use crate::utils::{format_key_binding_for_display as key, truncate};
use crate::Config;

/// Render markdown to owned lines wrapped at `width`
pub fn markdown_lines(content: &str, width: u16) -> Vec<Line<'static>> {
    let parsed = RatSkin::default().parse(MinimadText::from(content), width);
    parsed
        .into_iter()
        .map(|line| {
            let spans: Vec<Span<'static>> = line
                .spans
                .into_iter()
                .map(|span| Span::styled(span.content.to_string(), span.style))
                .collect();
            Line::from(spans)
        })
        .collect()
}

/// Every message with a speaker header, oldest first
pub fn transcript_lines(messages: &[ChatMessage], awaiting_reply: bool, width: u16, accent: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in messages {
        let speaker = if message.from_bot { "Ecobot" } else { "You" };
        lines.push(Line::from(Span::styled(speaker, accent.add_modifier(Modifier::BOLD))));
        lines.extend(markdown_lines(&message.content, width));
        lines.push(Line::from(""));
    }
    if awaiting_reply {
        lines.push(Line::from(Span::styled("Ecobot is typing…", Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM))));
    }
    lines
}

pub fn render_chat(f: &mut Frame, area: Rect, chat: &mut ChatState, input_focused: bool, config: &Config) {
    let theme = config.get_active_theme();
    let fg_color = parse_color(&theme.fg);
    let accent = Style::default().fg(parse_color(&theme.highlight_bg));

    let [main_area, side_area] =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)]).areas(area);
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(main_area);
    let [content_area, scrollbar_area] =
        Layout::horizontal([Constraint::Min(1), Constraint::Length(1)]).areas(transcript_area);

    let text_width = content_area.width.saturating_sub(2);
    let lines = transcript_lines(&chat.messages, chat.awaiting_reply, text_width, accent);
    let viewport_height = content_area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();

    // Newest lines sit at the bottom; scrolling moves the window up
    let max_scroll = total_lines.saturating_sub(viewport_height);
    chat.scroll_from_bottom = cmp::min(chat.scroll_from_bottom, max_scroll);
    let start_line = max_scroll - chat.scroll_from_bottom;
    let end_line = cmp::min(start_line + viewport_height, total_lines);
    let visible = Text::from(lines[start_line..end_line].to_vec());

    let title = match &chat.conversation_id {
        Some(_) => "Ecobot Assistant (conversation)",
        None => "Ecobot Assistant",
    };
    let paragraph = Paragraph::new(visible)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg_color))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, content_area);

    if total_lines > viewport_height && content_area.height > 2 {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            content_area.y + 1,
            scrollbar_area.width,
            content_area.height.saturating_sub(2),
        );
        let mut scrollbar_state = ScrollbarState::new(max_scroll + 1)
            .viewport_content_length(viewport_height)
            .position(start_line);
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }

    let placeholder = format!("Press {} to ask Ecobot about reducing your footprint", key(&config.key_bindings.select));
    let input_title = if input_focused { "Message (Enter to send, Esc to stop typing)" } else { "Message" };
    render_input(f, input_area, &mut chat.input, input_title, &placeholder, input_focused, config);

    render_sidebar(f, side_area, chat, config);
}

fn render_sidebar(f: &mut Frame, area: Rect, chat: &ChatState, config: &Config) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let [tips_area, history_area] =
        Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
    let width = tips_area.width.saturating_sub(2) as usize;

    let tips: Vec<Line> = if chat.recommendations.is_empty() {
        vec![Line::from(Span::styled("No recommendations yet", Style::default().add_modifier(Modifier::DIM)))]
    } else {
        chat.recommendations
            .iter()
            .flat_map(|r| [Line::from(format!("• {}", r)), Line::from("")])
            .collect()
    };
    let tips = Paragraph::new(tips)
        .style(Style::default().fg(fg_color))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Recommendations"));
    f.render_widget(tips, tips_area);

    let history: Vec<Line> = if chat.conversations.is_empty() {
        vec![Line::from(Span::styled("No past conversations", Style::default().add_modifier(Modifier::DIM)))]
    } else {
        chat.conversations
            .iter()
            .map(|c| {
                let title = c.title.as_deref().or(c.preview.as_deref()).unwrap_or("Untitled");
                let date = c.created_at.as_deref().map(|d| truncate(d, 10)).unwrap_or_default();
                Line::from(truncate(&format!("{} {}", date, title).trim().to_string(), width))
            })
            .collect()
    };
    let history = Paragraph::new(history)
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title("Recent Conversations"));
    f.render_widget(history, history_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_has_speaker_headers() {
        let messages = vec![
            ChatMessage::bot("Hello".to_string()),
            ChatMessage::user("Tips?".to_string()),
        ];
        let lines = transcript_lines(&messages, true, 40, Style::default());
        let text: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(text[0], "Ecobot");
        assert!(text.iter().any(|l| l == "You"));
        assert_eq!(text.last().map(String::as_str), Some("Ecobot is typing…"));
    }

    #[test]
    fn test_markdown_strips_emphasis_markers() {
        let lines = markdown_lines("Turn **off** lights", 40);
        let text: String = lines.iter().flat_map(|l| l.spans.iter().map(|s| s.content.to_string())).collect();
        assert!(text.contains("off"));
        assert!(!text.contains("**"));
    }
}
