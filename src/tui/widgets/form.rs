use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Direction, Rect};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::tui::app::{FieldKind, Form};
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};
use crate::tui::widgets::input::render_input;
use crate::utils::format_key_binding_for_display;

const FIELD_HEIGHT: u16 = 3;
const FORM_WIDTH: u16 = 60;

/// Rows needed for the whole form including borders, error and submit lines
pub fn form_height(form: &Form) -> u16 {
    form.fields.len() as u16 * FIELD_HEIGHT + 2 + 2
}

/// Centered box sized to the form, clipped to `area`
pub fn form_area(area: Rect, form: &Form) -> Rect {
    let width = FORM_WIDTH.min(area.width);
    let height = form_height(form).min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Choice fields show `‹ option ›`; an empty option shows the placeholder
fn choice_line(options: &[String], selected: usize, placeholder: &str, focused: bool, style: Style) -> Line<'static> {
    let value = options.get(selected).map(String::as_str).unwrap_or_default();
    let text = if value.is_empty() { placeholder } else { value };
    let arrows = if focused { Style::default().add_modifier(Modifier::BOLD) } else { style };
    Line::from(vec![
        Span::styled("‹ ", arrows),
        Span::styled(text.to_string(), if value.is_empty() { style.add_modifier(Modifier::DIM) } else { style }),
        Span::styled(" ›", arrows),
    ])
}

pub fn render_form(f: &mut Frame, area: Rect, form: &mut Form, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = if active_theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&active_theme.highlight_fg)
    };
    let normal = Style::default().fg(fg_color).bg(bg_color);

    let popup = form_area(area, form);
    if popup.width < 4 || popup.height < 4 {
        return;
    }
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(form.kind.title())
        .title_alignment(Alignment::Center)
        .style(normal);
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let mut constraints: Vec<Constraint> = form.fields.iter().map(|_| Constraint::Length(FIELD_HEIGHT)).collect();
    constraints.push(Constraint::Length(1)); // Error
    constraints.push(Constraint::Length(1)); // Submit
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let current = form.current;
    for (index, field) in form.fields.iter_mut().enumerate() {
        let focused = index == current;
        let area = rows[index];
        match &field.kind {
            FieldKind::Choice { options, selected } => {
                let border_style = if focused { Style::default().fg(highlight_bg) } else { Style::default().fg(fg_color) };
                let paragraph = Paragraph::new(choice_line(options, *selected, field.placeholder, focused, normal))
                    .block(Block::default().borders(Borders::ALL).border_style(border_style).title(field.label))
                    .style(normal);
                f.render_widget(paragraph, area);
            }
            FieldKind::Text | FieldKind::Secret => {
                render_input(f, area, &mut field.input, field.label, field.placeholder, focused, config);
            }
        }
    }

    let error_row = rows[form.fields.len()];
    if let Some(error) = &form.error {
        let error_line = Paragraph::new(Span::styled(
            error.clone(),
            Style::default().fg(ratatui::style::Color::Red).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        f.render_widget(error_line, error_row);
    }

    let submit_row = rows[form.fields.len() + 1];
    let submit_text = if form.submitting {
        "Please wait…".to_string()
    } else {
        format!(
            "[ {} ]  {} to submit · Esc to cancel",
            form.kind.submit_label(),
            format_key_binding_for_display(&config.key_bindings.submit)
        )
    };
    let submit = Paragraph::new(Span::styled(
        submit_text,
        Style::default().fg(highlight_fg).bg(highlight_bg),
    ))
    .alignment(Alignment::Center);
    f.render_widget(submit, submit_row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn test_form_area_is_centered_and_clipped() {
        let form = Form::login();
        let area = Rect::new(0, 0, 100, 40);
        let popup = form_area(area, &form);
        assert_eq!(popup.width, FORM_WIDTH);
        assert_eq!(popup.height, 2 * FIELD_HEIGHT + 4);
        assert_eq!(popup.x, 20);

        let tiny = Rect::new(0, 0, 30, 8);
        let popup = form_area(tiny, &Form::activity(Category::Energy, &[]));
        assert_eq!(popup.width, 30);
        assert_eq!(popup.height, 8);
    }

    #[test]
    fn test_empty_choice_shows_placeholder() {
        let line = choice_line(&[String::new(), "Car".to_string()], 0, "Select vehicle type", false, Style::default());
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "‹ Select vehicle type ›");
    }
}
