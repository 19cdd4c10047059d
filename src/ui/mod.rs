pub mod widgets;

use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub fn render(frame: &mut Frame, app: &App) {
    // Width available for text is total width - 2 (for borders)
    let available_width = frame.area().width.saturating_sub(2).max(1) as usize;

    let prompt = app.controller.prompt();
    let input_lines = if prompt.is_empty() {
        1
    } else {
        prompt.chars().count().div_ceil(available_width)
    };

    // Clamp lines: Min 3, Max 40% of screen height
    let max_lines = (frame.area().height as usize * 2 / 5).saturating_sub(2).max(3);
    let actual_lines = input_lines.clamp(3, max_lines);

    #[allow(clippy::cast_possible_truncation)]
    let input_height = (actual_lines + 2) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),            // Title
            Constraint::Length(input_height), // Prompt input
            Constraint::Length(1),            // Generate trigger
            Constraint::Min(0),               // Result / error
            Constraint::Length(1),            // Backend line
            Constraint::Length(1),            // Bottom keymap bar
        ])
        .split(frame.area());

    widgets::render_title(frame, chunks[0]);
    widgets::render_input_field(frame, app, chunks[1]);
    widgets::render_trigger(frame, app, chunks[2]);
    widgets::render_result(frame, app, chunks[3]);
    widgets::render_status_bar(frame, app, chunks[4]);
    widgets::render_bottom_bar(frame, app, chunks[5]);

    if app.show_help {
        widgets::render_help_window(frame, frame.area());
    }

    if app.show_info {
        widgets::render_info_window(frame, app, frame.area());
    }
}
