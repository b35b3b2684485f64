//! labengine - a single-window graphics and keyboard library for labs
//!
//! The application thread draws on an off-screen surface and reads keys;
//! a dedicated window thread owns the native window, paints the surface
//! and feeds key presses into a bounded queue.
//!
//! # Quick Start
//!
//! ```no_run
//! use labengine::{Key, Lab, Palette};
//!
//! let mut lab = Lab::new();
//! lab.initialize().expect("no window");
//! lab.set_color(Palette::Red);
//! lab.draw_rect(10, 10, 200, 100);
//! lab.draw_circle(320, 240, 50);
//! lab.flush();
//! while lab.input_key() != Key::ESC {}
//! lab.terminate();
//! ```
//!
//! # Architecture
//!
//! ```text
//! application thread                 window thread
//! ──────────────────                 ─────────────
//! Lab::initialize ── spawn ────────> open window
//!        <──────── startup handshake ─┘
//! draw_* ──> SurfaceGuard <───────── Paint
//! flush  ──> SurfaceGuard ─> Presenter
//! input_key <── KeyQueue <────────── KeyDown / Char
//! Lab::terminate ── CloseRequested ─> destroy window
//!        <──────── exit handshake ────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod lab;
pub mod window;

pub use crate::config::Config;
pub use crate::core::color::{Color, Palette};
pub use crate::core::key::Key;
pub use crate::core::surface::Rect;
pub use crate::error::{BackendError, LabError, Result};
pub use crate::lab::Lab;
pub use crate::window::{
    Backend, HeadlessBackend, HeadlessHandle, TerminalBackend, ThreadState, WindowEvent,
};
#[cfg(windows)]
pub use crate::window::Win32Backend;
