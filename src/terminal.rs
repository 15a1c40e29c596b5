// SPDX-License-Identifier: GPL-3.0-only

//! Terminal display surface
//!
//! Shows the last classified bitmap using Unicode half-block characters,
//! the result text, and a status bar. Space, Enter, `c` or a left click on
//! the preview trigger a capture.

use crate::app::{Orchestrator, Stage, UiUpdate};
use crate::constants::{texts, timing};
use crate::media::ModelBitmap;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// What the display currently shows
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub preview: Option<ModelBitmap>,
    pub result_text: String,
}

impl DisplayState {
    pub fn new() -> Self {
        Self {
            preview: None,
            result_text: texts::WAITING_FOR_CAPTURE.to_string(),
        }
    }

    pub fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Status(text) => self.result_text = text,
            UiUpdate::Preview(bitmap) => self.preview = Some(bitmap),
            UiUpdate::Result(result) => self.result_text = result.display_text().to_string(),
        }
    }
}

/// Input mapped from terminal events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Trigger,
    Quit,
    None,
}

/// Map a key press to an action
pub fn key_action(key: &KeyEvent) -> InputAction {
    if key.kind != KeyEventKind::Press {
        return InputAction::None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputAction::Quit,
        KeyCode::Char('q') | KeyCode::Esc => InputAction::Quit,
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('c') => InputAction::Trigger,
        _ => InputAction::None,
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

/// Run the terminal UI until the user quits
pub fn run(
    orchestrator: &Orchestrator,
    updates: UnboundedReceiver<UiUpdate>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, orchestrator, updates);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    orchestrator: &Orchestrator,
    mut updates: UnboundedReceiver<UiUpdate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let trigger = orchestrator.trigger_handle();
    let mut state = DisplayState::new();
    let mut preview_area = Rect::default();

    loop {
        while let Ok(update) = updates.try_recv() {
            state.apply(update);
        }

        terminal.draw(|f| {
            let area = f.area();

            // Bottom two lines: result text and status bar
            preview_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };
            let result_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            let status_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            f.render_widget(
                PreviewWidget {
                    bitmap: state.preview.as_ref(),
                },
                preview_area,
            );
            f.render_widget(
                ResultLine {
                    text: &state.result_text,
                },
                result_area,
            );
            let status = build_status_message(orchestrator.stage(), orchestrator.has_button());
            f.render_widget(StatusBar { message: &status }, status_area);
        })?;

        if !event::poll(timing::UI_POLL)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => match key_action(&key) {
                InputAction::Quit => {
                    info!("Quit requested");
                    break;
                }
                InputAction::Trigger => {
                    debug!(key = ?key.code, "Shutter key");
                    trigger.fire();
                }
                InputAction::None => {}
            },
            Event::Mouse(mouse)
                if mouse.kind == MouseEventKind::Down(MouseButton::Left)
                    && contains(preview_area, mouse.column, mouse.row) =>
            {
                debug!(column = mouse.column, row = mouse.row, "Screen tap");
                trigger.fire();
            }
            _ => {}
        }
    }

    Ok(())
}

fn build_status_message(stage: Stage, has_button: bool) -> String {
    let mut msg = String::from("Space/Enter/c or click: capture");
    if has_button {
        msg.push_str(" | button: capture");
    }
    msg.push_str(&format!(" | q: quit | {}", stage));
    msg
}

/// Renders the model bitmap with half-block characters
struct PreviewWidget<'a> {
    bitmap: Option<&'a ModelBitmap>,
}

impl Widget for PreviewWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(bitmap) = self.bitmap else {
            let msg = texts::READY;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Each cell shows two vertical pixels; the bitmap is square
        let side = area.width.min(area.height.saturating_mul(2));
        let display_width = side;
        let display_height = side / 2;
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width - display_width) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = bitmap.width() as f64 / display_width as f64;
        let y_scale = bitmap.height() as f64 / (display_height as f64 * 2.0);
        let max_x = bitmap.width() - 1;
        let max_y = bitmap.height() - 1;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = ((tx as f64 * x_scale) as u32).min(max_x);
                let src_top = ((ty as f64 * 2.0 * y_scale) as u32).min(max_y);
                let src_bottom = (((ty as f64 * 2.0 + 1.0) * y_scale) as u32).min(max_y);

                let [tr, tg, tb] = bitmap.pixel(src_x, src_top);
                let [br, bg, bb] = bitmap.pixel(src_x, src_bottom);

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(tr, tg, tb));
                    cell.set_bg(Color::Rgb(br, bg, bb));
                }
            }
        }
    }
}

/// Centred, bold classification result
struct ResultLine<'a> {
    text: &'a str,
}

impl Widget for ResultLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let len = self.text.chars().count() as u16;
        let x = area.x + area.width.saturating_sub(len) / 2;
        buf.set_stringn(
            x,
            area.y,
            self.text,
            area.width as usize,
            Style::default().add_modifier(Modifier::BOLD),
        );
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_stringn(
            area.x,
            area.y,
            self.message,
            area.width as usize,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
