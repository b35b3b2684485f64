//! Terminal backend using crossterm.
//!
//! The surface is shown in the alternate screen, two pixels per cell using
//! the upper half block (`▀`) with the top pixel as foreground and the
//! bottom pixel as background. Surfaces larger than the terminal are
//! sampled down with a uniform step; `scale` is ignored here.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color as TermColor, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use super::{Backend, EventPoster, EventPump, NativeWindow, Presenter, WindowEvent};
use crate::config::Config;
use crate::core::color::split_rgb;
use crate::core::key::vk;
use crate::core::surface::{Rect, Surface};
use crate::error::BackendError;

/// How long the pump waits for terminal input before checking posted events
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const HALF_BLOCK: char = '\u{2580}';

pub struct TerminalBackend;

impl Backend for TerminalBackend {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn open(&self, _config: &Config) -> Result<NativeWindow, BackendError> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        ) {
            let _ = terminal::disable_raw_mode();
            return Err(BackendError::WindowCreation(e.to_string()));
        }

        let (tx, rx) = mpsc::channel();
        Ok(NativeWindow {
            pump: Box::new(TerminalPump {
                posted: rx,
                active: true,
            }),
            presenter: Arc::new(TerminalPresenter {
                out: Mutex::new(io::stdout()),
            }),
            poster: Arc::new(TerminalPoster { tx: Mutex::new(tx) }),
        })
    }
}

struct TerminalPump {
    posted: Receiver<WindowEvent>,
    active: bool,
}

impl TerminalPump {
    fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = stdout.flush();
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::error!("Failed to leave raw mode: {}", e);
        }
    }
}

impl EventPump for TerminalPump {
    fn next_event(&mut self) -> Option<WindowEvent> {
        loop {
            if !self.active {
                return None;
            }
            match self.posted.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            match event::poll(POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if let Some(event) = translate(&ev) {
                            return Some(event);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Terminal read failed: {}", e);
                        return None;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Terminal poll failed: {}", e);
                    return None;
                }
            }
        }
    }

    fn destroy(&mut self) {
        self.restore();
    }

    fn beep(&self) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

impl Drop for TerminalPump {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Map a terminal event onto the window events the event loop understands
fn translate(ev: &Event) -> Option<WindowEvent> {
    match ev {
        Event::Key(key) if key.kind != KeyEventKind::Release => {
            let down = |code: u16| {
                Some(WindowEvent::KeyDown {
                    vk: code,
                    repeat: 1,
                })
            };
            match key.code {
                KeyCode::Enter => down(vk::RETURN),
                KeyCode::Esc => down(vk::ESCAPE),
                KeyCode::Backspace => down(vk::BACK),
                KeyCode::Tab => down(vk::TAB),
                KeyCode::PageUp => down(vk::PRIOR),
                KeyCode::PageDown => down(vk::NEXT),
                KeyCode::Left => down(vk::LEFT),
                KeyCode::Up => down(vk::UP),
                KeyCode::Right => down(vk::RIGHT),
                KeyCode::Down => down(vk::DOWN),
                // Ctrl+C plays the part of the window's close box
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(WindowEvent::CloseRequested)
                }
                KeyCode::Char(c) => Some(WindowEvent::Char {
                    code: c as u32,
                    repeat: 1,
                }),
                _ => None,
            }
        }
        Event::Resize(..) | Event::FocusGained => Some(WindowEvent::Paint { full: true }),
        _ => None,
    }
}

struct TerminalPresenter {
    out: Mutex<io::Stdout>,
}

/// Surface pixels per terminal column (and per half row) so the whole
/// surface fits
fn sample_step(surface_w: u32, surface_h: u32, cols: u16, rows: u16) -> u32 {
    let cols = cols.max(1) as u32;
    let half_rows = (rows.max(1) as u32) * 2;
    let step_x = (surface_w + cols - 1) / cols;
    let step_y = (surface_h + half_rows - 1) / half_rows;
    step_x.max(step_y).max(1)
}

/// Terminal cells covering `area` at the given step
fn cell_span(area: Rect, step: u32) -> Rect {
    let s = step as i32;
    Rect::new(
        area.left / s,
        area.top / (2 * s),
        (area.right + s - 1) / s,
        (area.bottom + 2 * s - 1) / (2 * s),
    )
}

fn term_color(pixel: u32) -> TermColor {
    let (r, g, b) = split_rgb(pixel);
    TermColor::Rgb { r, g, b }
}

impl Presenter for TerminalPresenter {
    fn present(&self, surface: &Surface, area: Rect, _scale: u32) -> Result<(), BackendError> {
        let (cols, rows) = terminal::size()?;
        let step = sample_step(surface.width(), surface.height(), cols, rows);
        let cells = cell_span(area, step);
        let s = step as i32;

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = io::BufWriter::with_capacity(65536, &mut *out);
        for cy in cells.top.max(0)..cells.bottom.min(rows as i32) {
            queue!(out, MoveTo(cells.left.max(0) as u16, cy as u16))?;
            for cx in cells.left.max(0)..cells.right.min(cols as i32) {
                let top = surface.pixel(cx * s, cy * 2 * s);
                let bottom = surface.pixel(cx * s, cy * 2 * s + s);
                match top {
                    Some(top) => queue!(
                        out,
                        SetForegroundColor(term_color(top)),
                        SetBackgroundColor(bottom.map_or(TermColor::Reset, term_color)),
                        Print(HALF_BLOCK)
                    )?,
                    None => queue!(out, ResetColor, Print(' '))?,
                }
            }
        }
        queue!(out, ResetColor)?;
        out.flush()?;
        Ok(())
    }
}

struct TerminalPoster {
    tx: Mutex<Sender<WindowEvent>>,
}

impl EventPoster for TerminalPoster {
    fn post(&self, event: WindowEvent) -> Result<(), BackendError> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event)
            .map_err(|_| BackendError::Disconnected)
    }
}
