use ratatui::widgets::Paragraph;
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::Rect;
use crate::Config;
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};

const SEPARATOR: &str = " • ";
const ELLIPSIS: &str = "...";

/// Fit as many hints as the width allows, marking dropped ones with an ellipsis
pub fn fit_hints(key_hints: &[String], max_width: usize) -> String {
    let separator_len = SEPARATOR.chars().count();
    let ellipsis_len = ELLIPSIS.chars().count();

    let mut hints_text = String::new();
    for (i, hint) in key_hints.iter().enumerate() {
        let hint_len = hint.chars().count();
        let current_len = hints_text.chars().count();
        let would_be_len = if i == 0 { hint_len } else { current_len + separator_len + hint_len };

        if would_be_len > max_width {
            if i == 0 {
                hints_text = hint.chars().take(max_width.saturating_sub(ellipsis_len)).collect();
            } else if current_len + ellipsis_len > max_width {
                hints_text = hints_text.chars().take(max_width.saturating_sub(ellipsis_len)).collect();
            }
            hints_text.push_str(ELLIPSIS);
            break;
        }

        if i > 0 {
            hints_text.push_str(SEPARATOR);
        }
        hints_text.push_str(hint);
    }
    hints_text
}

/// One-line bar: a status message when present, key hints otherwise.
/// `loading` prefixes a marker while requests are in flight.
pub fn render_status_bar(
    f: &mut Frame,
    area: Rect,
    message: Option<&String>,
    key_hints: &[String],
    loading: bool,
    config: &Config,
) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);

    let prefix = if loading { "Loading… " } else { "" };
    let max_width = (area.width as usize).saturating_sub(prefix.chars().count());

    let (content, style) = if let Some(msg) = message {
        let msg_fg = get_contrast_text_color(highlight_bg);
        let mut content = msg.clone();
        if content.chars().count() > max_width {
            content = content.chars().take(max_width.saturating_sub(ELLIPSIS.len())).collect::<String>() + ELLIPSIS;
        }
        (content, Style::default().fg(msg_fg).bg(highlight_bg).add_modifier(Modifier::BOLD))
    } else {
        (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color))
    };

    let paragraph = Paragraph::new(format!("{}{}", prefix, content))
        .style(style)
        .wrap(ratatui::widgets::Wrap { trim: true });

    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> Vec<String> {
        vec!["q: Quit".to_string(), "n: New".to_string(), "d: Delete".to_string()]
    }

    #[test]
    fn test_all_hints_fit() {
        assert_eq!(fit_hints(&hints(), 80), "q: Quit • n: New • d: Delete");
    }

    #[test]
    fn test_overflow_gets_ellipsis() {
        let text = fit_hints(&hints(), 18);
        assert!(text.ends_with("..."));
        assert!(text.starts_with("q: Quit"));
        assert!(text.chars().count() <= 18);
    }

    #[test]
    fn test_first_hint_too_long() {
        assert_eq!(fit_hints(&hints(), 5), "q:...");
    }
}
