use ratatui::widgets::{Block, Borders, Paragraph, Clear};
use ratatui::style::Style;
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment};
use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::confirm_delete::popup_area;
use crate::utils::format_key_binding_for_display as key;

pub fn render_help(f: &mut Frame, area: Rect, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);

    let popup_area = popup_area(area, 60, 80);
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(config))
        .block(Block::default()
            .borders(Borders::ALL)
            .title("Help - Key Bindings")
            .title_alignment(Alignment::Center)
            .style(Style::default().fg(fg_color).bg(bg_color)))
        .style(Style::default().fg(fg_color).bg(bg_color))
        .wrap(ratatui::widgets::Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

pub fn build_help_text(config: &Config) -> String {
    let kb = &config.key_bindings;
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {}: Switch tabs\n", key(&kb.tab_left), key(&kb.tab_right)));
    text.push_str("  1-5: Jump to tab\n");
    text.push_str(&format!("  {} / {}: Move selection (scroll in Assistant)\n", key(&kb.list_up), key(&kb.list_down)));
    text.push('\n');

    text.push_str("Dashboard & Activities:\n");
    text.push_str(&format!("  {}: Log a new activity\n", key(&kb.new)));
    text.push_str(&format!("  {}: Delete selected activity\n", key(&kb.delete)));
    text.push_str(&format!("  {}: Cycle category filter\n", key(&kb.filter)));
    text.push_str(&format!("  {}: Search activities\n", key(&kb.search)));
    text.push_str(&format!("  {}: Reload from server\n", key(&kb.refresh)));
    text.push('\n');

    text.push_str("Discover:\n");
    text.push_str(&format!("  {}: Save / unsave place\n", key(&kb.like)));
    text.push_str(&format!("  {}: Cycle place category\n", key(&kb.filter)));
    text.push_str(&format!("  {}: Search places\n", key(&kb.search)));
    text.push_str(&format!("  {}: Find a location on the map\n", key(&kb.locate)));
    text.push('\n');

    text.push_str("Assistant:\n");
    text.push_str(&format!("  {}: Start typing a message\n", key(&kb.select)));
    text.push_str(&format!("  {}: New conversation\n", key(&kb.new)));
    text.push_str(&format!("  {}: Copy last reply\n", key(&kb.copy)));
    text.push('\n');

    text.push_str("Profile:\n");
    text.push_str("  e: Edit profile\n");
    text.push_str("  p: Change password\n");
    text.push_str("  t: Next theme\n");
    text.push_str("  x: Delete account\n");
    text.push('\n');

    text.push_str("Forms:\n");
    text.push_str("  Tab / Shift+Tab: Next / previous field\n");
    text.push_str("  ← / → on a choice: Change option\n");
    text.push_str(&format!("  Enter on last field or {}: Submit\n", key(&kb.submit)));
    text.push_str("  Ctrl+V: Paste  Ctrl+Z: Undo\n");
    text.push_str("  Esc: Cancel\n");
    text.push_str("  Ctrl+N: Switch between log in and sign up\n");
    text.push('\n');

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Quit\n", key(&kb.quit)));
    text.push_str(&format!("  {}: Show/hide help\n", key(&kb.help)));
    text.push_str(&format!("  {}: Log out\n", key(&kb.logout)));

    text
}
