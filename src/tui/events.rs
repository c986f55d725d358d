use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, size as terminal_size};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::io;
use crate::tui::app::{Form, Mode, Tab};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::widgets::input::TextInput;
use crate::tui::App;
use crate::utils::{has_primary_modifier, parse_key_binding};

/// Restores the terminal even on panic. Leaving raw mode or the alternate
/// screen enabled would make the user's shell unusable.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore on normal exit; drop is then a no-op
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already cleaning up; errors have nowhere to go
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Checked before entering the alternate screen so the error stays visible
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;

    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let mut guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    tracing::info!("TUI started");

    loop {
        // Finished requests are applied before drawing so the frame reflects them
        app.process_api_events();
        app.check_status_message_timeout();

        let frame_size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, frame_size.width, frame_size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // Only Press events; Windows also reports Release
        if event::poll(std::time::Duration::from_millis(16))?
            && let Event::Key(key_event) = event::read()?
            && key_event.kind == KeyEventKind::Press
            && handle_key_event(&mut app, key_event)?
        {
            break;
        }
    }

    guard.restore()?;
    tracing::info!("TUI exited");
    Ok(())
}

/// Returns true when the app should quit
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if app.modals.delete_confirmation.is_some() {
        return handle_delete_confirmation_modal(app, key_event);
    }

    match app.ui.mode {
        Mode::Auth | Mode::Form => handle_form_mode(app, key_event),
        Mode::Help => handle_help_mode(app, key_event),
        Mode::Search => handle_search_mode(app, key_event),
        Mode::Chat => handle_chat_mode(app, key_event),
        Mode::View => handle_global_key_bindings(app, key_event),
    }
}

fn is_pressed(key_event: KeyEvent, binding: &str) -> Result<bool, TuiError> {
    let parsed = parse_key_binding(binding).map_err(TuiError::KeyBindingError)?;
    Ok(matches_key_event(key_event, &parsed))
}

fn is_primary_char(key_event: KeyEvent, c: char) -> bool {
    has_primary_modifier(key_event.modifiers) && key_event.code == KeyCode::Char(c)
}

/// Keys shared by every single-line field. Returns true when consumed.
fn edit_text(input: &mut TextInput, key_event: KeyEvent) -> bool {
    let primary = has_primary_modifier(key_event.modifiers);
    match key_event.code {
        KeyCode::Char('z') if primary => {
            input.undo();
        }
        KeyCode::Char('u') if primary => input.clear(),
        KeyCode::Char(c) if !primary && !key_event.modifiers.contains(KeyModifiers::CONTROL) => input.insert_char(c),
        KeyCode::Backspace => input.delete_char(),
        KeyCode::Delete => input.delete_forward(),
        KeyCode::Left if primary => input.move_cursor_word_left(),
        KeyCode::Right if primary => input.move_cursor_word_right(),
        KeyCode::Left => input.move_cursor_left(),
        KeyCode::Right => input.move_cursor_right(),
        KeyCode::Home => input.move_cursor_home(),
        KeyCode::End => input.move_cursor_end(),
        _ => return false,
    }
    true
}

fn paste_from_clipboard(app: &mut App) {
    let text = match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
        Ok(text) => text,
        Err(e) => {
            app.set_status_message(format!("Failed to paste: {}", e));
            return;
        }
    };
    if let Some(input) = app.current_input_mut() {
        input.insert_str(&text);
    }
}

/// Edit the focused field, handling paste first
fn edit_current_input(app: &mut App, key_event: KeyEvent) -> bool {
    if is_primary_char(key_event, 'v') {
        paste_from_clipboard(app);
        return true;
    }
    match app.current_input_mut() {
        Some(input) => edit_text(input, key_event),
        None => false,
    }
}

fn handle_delete_confirmation_modal(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match key_event.code {
        KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
            // Two options; either direction toggles
            app.modals.delete_modal_selection = 1 - app.modals.delete_modal_selection.min(1);
        }
        KeyCode::Enter => {
            if app.modals.delete_modal_selection == 0 {
                app.confirm_delete();
            } else {
                app.cancel_delete();
            }
        }
        KeyCode::Esc => app.cancel_delete(),
        _ => {}
    }
    Ok(false)
}

fn handle_form_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if is_pressed(key_event, &app.config.key_bindings.submit)? {
        app.submit_form();
        return Ok(false);
    }

    if app.ui.mode == Mode::Auth && is_primary_char(key_event, 'n') {
        app.toggle_auth_form();
        return Ok(false);
    }

    let on_choice = app
        .form
        .active
        .as_ref()
        .and_then(|f| f.fields.get(f.current))
        .is_some_and(|f| f.is_choice());

    match key_event.code {
        KeyCode::Esc => {
            if app.ui.mode == Mode::Auth {
                return Ok(true);
            }
            app.close_form();
        }
        KeyCode::Tab | KeyCode::Down => {
            if let Some(form) = app.form.active.as_mut() {
                form.next_field();
            }
        }
        KeyCode::BackTab | KeyCode::Up => {
            if let Some(form) = app.form.active.as_mut() {
                form.prev_field();
            }
        }
        KeyCode::Enter => {
            let last = app.form.active.as_ref().is_some_and(|f| f.is_last_field());
            if last {
                app.submit_form();
            } else if let Some(form) = app.form.active.as_mut() {
                form.next_field();
            }
        }
        KeyCode::Left if on_choice => app.cycle_form_choice(false),
        KeyCode::Right | KeyCode::Char(' ') if on_choice => app.cycle_form_choice(true),
        _ => {
            edit_current_input(app, key_event);
        }
    }
    Ok(false)
}

fn handle_help_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if key_event.code == KeyCode::Esc || is_pressed(key_event, &app.config.key_bindings.help)? {
        app.ui.mode = Mode::View;
    }
    Ok(false)
}

fn handle_search_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match key_event.code {
        KeyCode::Esc => app.exit_search_mode(false),
        KeyCode::Enter => app.exit_search_mode(true),
        KeyCode::Up => app.move_selection(false),
        KeyCode::Down => app.move_selection(true),
        _ => {
            if edit_current_input(app, key_event) {
                app.apply_search();
            }
        }
    }
    Ok(false)
}

fn handle_chat_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match key_event.code {
        KeyCode::Esc => app.ui.mode = Mode::View,
        KeyCode::Enter => app.send_chat_message(),
        KeyCode::Up => app.move_selection(false),
        KeyCode::Down => app.move_selection(true),
        KeyCode::PageUp => app.chat.scroll_from_bottom += 10,
        KeyCode::PageDown => app.chat.scroll_from_bottom = app.chat.scroll_from_bottom.saturating_sub(10),
        _ => {
            edit_current_input(app, key_event);
        }
    }
    Ok(false)
}

fn handle_global_key_bindings(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let kb = app.config.key_bindings.clone();

    if is_pressed(key_event, &kb.quit)? {
        return Ok(true);
    }
    if is_pressed(key_event, &kb.help)? {
        app.ui.mode = Mode::Help;
        return Ok(false);
    }
    if is_pressed(key_event, &kb.logout)? {
        app.logout();
        app.set_status_message("Logged out".to_string());
        return Ok(false);
    }
    if is_pressed(key_event, &kb.tab_left)? {
        app.prev_tab();
        return Ok(false);
    }
    if is_pressed(key_event, &kb.tab_right)? {
        app.next_tab();
        return Ok(false);
    }
    if let KeyCode::Char(c @ '1'..='5') = key_event.code
        && !has_primary_modifier(key_event.modifiers)
    {
        let index = c as usize - '1' as usize;
        app.select_tab(Tab::ALL[index]);
        return Ok(false);
    }
    if key_event.code == KeyCode::Up || is_pressed(key_event, &kb.list_up)? {
        app.move_selection(false);
        return Ok(false);
    }
    if key_event.code == KeyCode::Down || is_pressed(key_event, &kb.list_down)? {
        app.move_selection(true);
        return Ok(false);
    }
    if is_pressed(key_event, &kb.refresh)? {
        app.refresh();
        app.set_status_message("Refreshing…".to_string());
        return Ok(false);
    }

    match app.ui.current_tab {
        Tab::Dashboard => {
            if is_pressed(key_event, &kb.new)? {
                app.open_activity_form();
            }
        }
        Tab::Activities => {
            if is_pressed(key_event, &kb.new)? {
                app.open_activity_form();
            } else if is_pressed(key_event, &kb.delete)? {
                app.request_delete_selected();
            } else if is_pressed(key_event, &kb.filter)? {
                app.cycle_activity_filter();
            } else if is_pressed(key_event, &kb.search)? {
                app.enter_search_mode();
            }
        }
        Tab::Discover => {
            if is_pressed(key_event, &kb.like)? {
                app.toggle_like_selected();
            } else if is_pressed(key_event, &kb.filter)? {
                app.cycle_place_filter();
            } else if is_pressed(key_event, &kb.search)? {
                app.enter_search_mode();
            } else if is_pressed(key_event, &kb.locate)? {
                app.open_form(Form::locate());
            }
        }
        Tab::Assistant => {
            if is_pressed(key_event, &kb.select)? {
                app.ui.mode = Mode::Chat;
            } else if is_pressed(key_event, &kb.new)? {
                app.reset_chat();
                app.set_status_message("Started a new conversation".to_string());
            } else if is_pressed(key_event, &kb.copy)? {
                app.copy_last_reply();
            }
        }
        Tab::Profile => match key_event.code {
            KeyCode::Char('e') => app.open_profile_form(),
            KeyCode::Char('p') => app.open_form(Form::password()),
            KeyCode::Char('t') => app.cycle_theme(),
            KeyCode::Char('x') => app.open_form(Form::delete_account()),
            _ => {}
        },
    }

    Ok(false)
}

fn matches_key_event(key_event: KeyEvent, binding: &crate::utils::ParsedKeyBinding) -> bool {
    // Ctrl on Windows/Linux, Option/Alt on macOS
    let has_primary_mod = has_primary_modifier(key_event.modifiers);
    if binding.requires_ctrl != has_primary_mod {
        return false;
    }
    binding.key_code == key_event.code
}
