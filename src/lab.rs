//! Lifecycle controller and the public drawing/input API.
//!
//! A [`Lab`] owns at most one live session: the window thread, the shared
//! surface and the key queue. [`Lab::initialize_with`] spawns the window
//! thread and waits until it reports whether the window exists;
//! [`Lab::terminate`] asks the window to close and waits for the thread to
//! finish. Both waits are bounded by [`Config::handshake_timeout_ms`].
//!
//! Calling drawing or input functions without a live session is a
//! programming error: it trips a debug assertion and is ignored in release
//! builds.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::color::{Color, Palette};
use crate::core::key::Key;
use crate::core::surface::{Rect, Surface};
use crate::error::{LabError, Result};
use crate::window::event_loop::{self, Shared};
use crate::window::{default_backend, Backend, EventPoster, Presenter, ThreadState, WindowEvent};

/// Pen color applied by every successful initialization
pub const DEFAULT_COLOR: Palette = Palette::White;

/// Join handle plus the exit handshake of the window thread
struct WindowThread {
    handle: Option<JoinHandle<()>>,
    exit: Mutex<Receiver<()>>,
}

impl WindowThread {
    /// Wait for the thread function to return, then join it
    fn join_within(&mut self, timeout: Duration) -> Result<()> {
        {
            let exit = self.exit.lock().unwrap_or_else(PoisonError::into_inner);
            match exit.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    return Err(LabError::Timeout("the window thread to exit"))
                }
            }
        }
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| LabError::WindowThreadPanicked)?;
        }
        Ok(())
    }
}

struct Session {
    shared: Arc<Shared>,
    presenter: Arc<dyn Presenter>,
    poster: Arc<dyn EventPoster>,
    thread: WindowThread,
    width: u32,
    height: u32,
    timeout: Duration,
}

/// Handle to one graphics window and its keyboard
pub struct Lab {
    backend: Arc<dyn Backend>,
    session: Option<Session>,
}

impl Default for Lab {
    fn default() -> Self {
        Self::new()
    }
}

impl Lab {
    /// Handle using the platform's native backend
    pub fn new() -> Self {
        Self::with_shared_backend(default_backend())
    }

    pub fn with_backend<B: Backend>(backend: B) -> Self {
        Self::with_shared_backend(Arc::new(backend))
    }

    pub fn with_shared_backend(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Initialize with the default 640x480 surface
    pub fn initialize(&mut self) -> Result<()> {
        self.initialize_with(&Config::default())
    }

    /// Start the window thread and wait until the window exists.
    ///
    /// Fails without side effects when a session is already live. On any
    /// other failure everything created so far is released before
    /// returning.
    pub fn initialize_with(&mut self, config: &Config) -> Result<()> {
        if self.session.is_some() {
            return Err(LabError::AlreadyInitialized);
        }
        config.validate()?;

        let shared = Arc::new(Shared::new(config));
        let timeout = config.handshake_timeout();
        let (startup_tx, startup_rx) = mpsc::sync_channel(1);
        let (exit_tx, exit_rx) = mpsc::channel();

        let handle = {
            let backend = Arc::clone(&self.backend);
            let config = config.clone();
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("lab-window".to_string())
                .spawn(move || event_loop::run(backend, config, shared, startup_tx, exit_tx))
                .map_err(LabError::ThreadSpawn)?
        };
        let mut thread = WindowThread {
            handle: Some(handle),
            exit: Mutex::new(exit_rx),
        };

        let (presenter, poster) = match startup_rx.recv_timeout(timeout) {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                if let Err(join) = thread.join_within(timeout) {
                    warn!("Window thread cleanup after failed init: {}", join);
                }
                return Err(e.into());
            }
            Err(RecvTimeoutError::Timeout) => {
                // Leave the thread detached; it closes its window as soon as
                // it notices nobody is waiting
                shared.quit.store(true, Ordering::SeqCst);
                if let Ok(Ok((_, poster))) = startup_rx.try_recv() {
                    let _ = poster.post(WindowEvent::CloseRequested);
                }
                error!("Window creation did not finish within {:?}", timeout);
                return Err(LabError::Timeout("the window to be created"));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join_within(timeout);
                return Err(LabError::WindowThreadPanicked);
            }
        };

        shared.surface.lock().set_pen(Color::Palette(DEFAULT_COLOR));
        self.session = Some(Session {
            shared,
            presenter,
            poster,
            thread,
            width: config.width,
            height: config.height,
            timeout,
        });
        info!(
            "Lab initialized: {}x{} scale {} ({})",
            config.width,
            config.height,
            config.scale,
            self.backend.name()
        );
        Ok(())
    }

    /// Close the window and wait for the window thread. Does nothing when
    /// no session is live.
    pub fn terminate(&mut self) {
        if let Err(e) = self.try_terminate() {
            error!("Terminate: {}", e);
        }
    }

    /// Like [`terminate`](Self::terminate) but reports a window thread
    /// that failed to stop in time. The session is gone either way.
    pub fn try_terminate(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.shared.quit.store(true, Ordering::SeqCst);
        if let Err(e) = session.poster.post(WindowEvent::CloseRequested) {
            warn!("Could not post close request: {}", e);
        }
        session.thread.join_within(session.timeout)?;
        debug!("Lab terminated");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Coarse sleep; not a synchronization point
    pub fn delay(&self, milliseconds: u64) {
        thread::sleep(Duration::from_millis(milliseconds));
    }

    fn live(&self, op: &'static str) -> Option<&Session> {
        debug_assert!(self.session.is_some(), "labengine: {} called before initialize", op);
        self.session.as_ref()
    }

    /// Run `f` on the surface under the guard
    fn with_surface<R>(&self, op: &'static str, f: impl FnOnce(&mut Surface) -> R) -> Option<R> {
        let session = self.live(op)?;
        let mut surface = session.shared.surface.lock();
        Some(f(&mut surface))
    }

    pub fn width(&self) -> u32 {
        self.live("width").map_or(0, |s| s.width)
    }

    pub fn height(&self) -> u32 {
        self.live("height").map_or(0, |s| s.height)
    }

    pub fn scale(&self) -> u32 {
        self.live("scale").map_or(0, |s| s.shared.scale)
    }

    pub fn set_color(&self, color: Palette) {
        self.with_surface("set_color", |s| s.set_pen(Color::Palette(color)));
    }

    pub fn set_color_rgb(&self, r: u8, g: u8, b: u8) {
        self.with_surface("set_color_rgb", |s| s.set_pen(Color::Rgb(r, g, b)));
    }

    /// Current palette color, `None` while a custom RGB color is in effect
    pub fn color(&self) -> Option<Palette> {
        self.with_surface("color", |s| s.pen().palette()).flatten()
    }

    pub fn pen(&self) -> Option<Color> {
        self.with_surface("pen", |s| s.pen())
    }

    pub fn clear(&self) {
        self.with_surface("clear", |s| s.clear());
    }

    pub fn clear_with(&self, color: Palette) {
        self.with_surface("clear_with", |s| s.clear_with(color));
    }

    pub fn draw_line(&self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.with_surface("draw_line", |s| s.draw_line(x1, y1, x2, y2));
    }

    pub fn draw_point(&self, x: i32, y: i32) {
        self.with_surface("draw_point", |s| s.draw_point(x, y));
    }

    pub fn draw_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.with_surface("draw_rect", |s| s.draw_rect(x1, y1, x2, y2));
    }

    pub fn draw_circle(&self, x: i32, y: i32, radius: i32) {
        self.with_surface("draw_circle", |s| s.draw_circle(x, y, radius));
    }

    pub fn draw_ellipse(&self, x: i32, y: i32, a: i32, b: i32) {
        self.with_surface("draw_ellipse", |s| s.draw_ellipse(x, y, a, b));
    }

    /// Show everything drawn since the last present
    pub fn flush(&self) {
        if let Some(session) = self.live("flush") {
            session.shared.present(session.presenter.as_ref(), false);
        }
    }

    /// Surface pixel as `0x00RRGGBB`
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.with_surface("pixel", |s| s.pixel(x, y)).flatten()
    }

    /// Area drawn since the last present
    pub fn dirty_region(&self) -> Option<Rect> {
        self.with_surface("dirty_region", |s| s.dirty()).flatten()
    }

    /// Wait for a key press and return its code. May return [`Key::NONE`]
    /// when the press that woke it was dropped on a full queue.
    pub fn input_key(&self) -> Key {
        match self.live("input_key") {
            Some(session) => session.shared.keys.pop_blocking(),
            None => Key::NONE,
        }
    }

    /// [`input_key`](Self::input_key) with an upper bound on the wait
    pub fn input_key_timeout(&self, timeout: Duration) -> Option<Key> {
        self.live("input_key_timeout")?.shared.keys.pop_timeout(timeout)
    }

    /// Whether a key is waiting to be read
    pub fn input_key_ready(&self) -> bool {
        self.live("input_key_ready")
            .map_or(false, |s| s.shared.keys.is_ready())
    }

    /// State of the window thread, `None` without a session
    pub fn window_state(&self) -> Option<ThreadState> {
        self.session.as_ref().map(|s| s.shared.state())
    }
}

impl Drop for Lab {
    fn drop(&mut self) {
        self.terminate();
    }
}
