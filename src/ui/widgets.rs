use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::controller::RequestState;

pub fn render_title(frame: &mut Frame, area: Rect) {
    let title = Paragraph::new(Line::from(Span::styled(
        "Generate an AI Image",
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);

    frame.render_widget(title, area);
}

pub fn render_help_window(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(Span::styled(
            "PromptShot - Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("General:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Ctrl+H        - Show/hide this help"),
        Line::from("  Ctrl+I        - Show/hide session info"),
        Line::from("  Ctrl+Q        - Quit application"),
        Line::from("  Ctrl+C        - Quit (press twice)"),
        Line::from(""),
        Line::from(Span::styled("Prompt:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Typing        - Edit the prompt"),
        Line::from("  Backspace     - Delete last character"),
        Line::from("  Ctrl+U        - Clear the prompt"),
        Line::from("  Enter         - Generate image"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Ctrl+H or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help_paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    let popup_area = centered(area, 50, 19);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(help_paragraph, popup_area);
}

pub fn render_info_window(frame: &mut Frame, app: &App, area: Rect) {
    let params = app.controller.params();
    let latency = app
        .last_latency
        .map_or_else(|| "-".to_string(), |d| format!("{:.1}s", d.as_secs_f64()));
    let last_prompt = app
        .latest_record
        .as_ref()
        .map_or("-", |record| record.prompt.as_str());

    let info_text = vec![
        Line::from(Span::styled(
            "Session Information",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("Model: "),
            Span::styled(app.controller.model_id(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Region: "),
            Span::styled(app.region.as_str(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Size: "),
            Span::styled(
                format!("{}x{}", params.width, params.height),
                Style::default().fg(Color::Blue),
            ),
        ]),
        Line::from(vec![
            Span::raw("CFG scale / seed: "),
            Span::styled(
                format!("{:.1} / {}", params.cfg_scale, params.seed),
                Style::default().fg(Color::Blue),
            ),
        ]),
        Line::from(vec![
            Span::raw("Last request: "),
            Span::styled(latency, Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::raw("Saved images: "),
            Span::styled(app.saved_count.to_string(), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::raw("Last saved prompt: "),
            Span::styled(last_prompt, Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Press Ctrl+I to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let info_paragraph = Paragraph::new(info_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Info ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    let popup_area = centered(area, 50, 14);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(info_paragraph, popup_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;

    Rect {
        x: area.x + x,
        y: area.y + y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

pub fn render_input_field(frame: &mut Frame, app: &App, area: Rect) {
    let prompt = app.controller.prompt();
    let (input_text, input_style) = if prompt.is_empty() {
        ("Enter text here...", Style::default().fg(Color::Gray))
    } else {
        (
            prompt,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let input = Paragraph::new(input_text)
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Prompt ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);
}

/// The Generate control, disabled exactly while a request is in flight
pub fn render_trigger(frame: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.controller.is_in_flight() {
        (
            "[ Generating image, this may take a while... ]",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )
    } else {
        (
            "[ Generate ]",
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        )
    };

    let trigger = Paragraph::new(Span::styled(text, style)).alignment(Alignment::Center);
    frame.render_widget(trigger, area);
}

pub fn render_result(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];

    match app.controller.state() {
        RequestState::Succeeded => {
            if let Some(image) = app.controller.artifact() {
                lines.push(Line::from(Span::styled(
                    "Image generated",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                if let Some(saved) = &app.saved_image {
                    lines.push(Line::from(format!("Saved to: {}", saved.path.display())));
                    lines.push(Line::from(format!("Size: {} bytes", saved.size_bytes)));
                    if let Some((width, height)) = saved.dimensions {
                        lines.push(Line::from(format!("Dimensions: {width}x{height}")));
                    }
                } else {
                    lines.push(Line::from(format!(
                        "Payload: {} base64 characters (not saved)",
                        image.base64.len()
                    )));
                }
            }
        }
        RequestState::Failed(message) => {
            lines.push(Line::from(Span::styled(
                message.as_str(),
                Style::default().fg(Color::Red),
            )));
        }
        RequestState::Idle | RequestState::InFlight => {}
    }

    if let Some(notice) = &app.notice {
        lines.push(Line::from(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let result = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(result, area);
}

pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status_text = format!(
        "Using {} with {}",
        app.controller.backend_name(),
        app.controller.model_id()
    );

    let status = Paragraph::new(status_text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));

    frame.render_widget(status, area);
}

pub fn render_bottom_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.exit_pending {
        (
            "Press Ctrl+C again to exit, Esc to cancel",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            "Enter: Generate | Ctrl+C: Quit | Ctrl+I: Info | Ctrl+H: Help",
            Style::default().fg(Color::DarkGray),
        )
    };

    let bar = Paragraph::new(text).alignment(Alignment::Center).style(style);

    frame.render_widget(bar, area);
}
