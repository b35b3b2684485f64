//! The window thread and the native backends it drives.
//!
//! A [`Backend`] is opened on the window thread and hands back three parts:
//!
//! - an [`EventPump`] that stays on the window thread and yields
//!   [`WindowEvent`]s until the window is destroyed,
//! - a [`Presenter`] that blits the surface to the screen, shared between
//!   the paint handler and [`Lab::flush`](crate::Lab::flush),
//! - an [`EventPoster`] the application thread uses to post events into
//!   the window's queue (close requests, repaints).
//!
//! Backends:
//!
//! - **win32**: a native GDI window (Windows only)
//! - **terminal**: renders into the terminal with crossterm
//! - **headless**: in-memory screen with injectable input, for tests

pub mod event_loop;
pub mod headless;
pub mod terminal;
#[cfg(windows)]
pub mod win32;

use std::sync::Arc;

use crate::config::Config;
use crate::core::surface::{Rect, Surface};
use crate::error::BackendError;

pub use event_loop::ThreadState;
pub use headless::{HeadlessBackend, HeadlessHandle};
pub use terminal::TerminalBackend;
#[cfg(windows)]
pub use win32::Win32Backend;

/// Events delivered to the window thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The screen needs repainting. `full` repaints the whole surface,
    /// otherwise only the dirty region is blitted.
    Paint { full: bool },
    /// A key went down; `vk` is a Windows virtual-key code
    KeyDown { vk: u16, repeat: u16 },
    /// A translated character
    Char { code: u32, repeat: u16 },
    /// Someone asked the window to close
    CloseRequested,
}

/// Window-thread side of a native window
pub trait EventPump {
    /// Block until the next event. Returns `None` once the window has been
    /// destroyed and its event source has ended.
    fn next_event(&mut self) -> Option<WindowEvent>;

    /// Tear the window down; the pump ends afterwards
    fn destroy(&mut self);

    /// Audible cue for a dropped key
    fn beep(&self);
}

/// Blits the surface to the screen
pub trait Presenter: Send + Sync {
    fn present(&self, surface: &Surface, area: Rect, scale: u32) -> Result<(), BackendError>;
}

/// Posts events into the window's queue from any thread
pub trait EventPoster: Send + Sync {
    fn post(&self, event: WindowEvent) -> Result<(), BackendError>;
}

/// Everything a backend creates when it opens a window
pub struct NativeWindow {
    pub pump: Box<dyn EventPump>,
    pub presenter: Arc<dyn Presenter>,
    pub poster: Arc<dyn EventPoster>,
}

/// Factory for native windows. `open` runs on the window thread.
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn open(&self, config: &Config) -> Result<NativeWindow, BackendError>;
}

/// The platform's native backend
pub fn default_backend() -> Arc<dyn Backend> {
    #[cfg(windows)]
    {
        Arc::new(Win32Backend)
    }
    #[cfg(not(windows))]
    {
        Arc::new(TerminalBackend)
    }
}
