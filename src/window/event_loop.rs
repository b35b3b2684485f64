//! Window thread body.
//!
//! ```text
//! Starting ──open ok──> Running ──close + quit──> ClosePending ──pump ends──> Terminated
//!    │                     │
//!    └──open failed────────┴──────────────────────────────────────────────> Terminated
//! ```
//!
//! The startup signal is sent exactly once, whether or not the window could
//! be created. The exit signal fires when the thread function returns, even
//! by panic.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{Sender, SyncSender};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{Backend, EventPoster, EventPump, Presenter, WindowEvent};
use crate::config::Config;
use crate::core::guard::SurfaceGuard;
use crate::core::key::Key;
use crate::core::keyqueue::KeyQueue;
use crate::core::surface::Surface;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    Starting = 0,
    Running = 1,
    ClosePending = 2,
    Terminated = 3,
}

impl ThreadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ThreadState::Starting,
            1 => ThreadState::Running,
            2 => ThreadState::ClosePending,
            _ => ThreadState::Terminated,
        }
    }
}

/// State shared by the application thread and the window thread
pub struct Shared {
    pub surface: SurfaceGuard,
    pub keys: KeyQueue,
    /// Set by terminate; the only way a close request is honored
    pub quit: AtomicBool,
    pub scale: u32,
    state: AtomicU8,
}

impl Shared {
    pub fn new(config: &Config) -> Self {
        Self {
            surface: SurfaceGuard::new(Surface::new(config.width, config.height)),
            keys: KeyQueue::new(),
            quit: AtomicBool::new(false),
            scale: config.scale,
            state: AtomicU8::new(ThreadState::Starting as u8),
        }
    }

    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ThreadState) {
        debug!("Window thread: {:?} -> {:?}", self.state(), state);
        self.state.store(state as u8, Ordering::Release);
    }

    /// Blit the dirty region (or the whole surface) and clear it. Runs
    /// under the surface guard; a failed blit keeps the region dirty.
    pub fn present(&self, presenter: &dyn Presenter, full: bool) {
        let mut surface = self.surface.lock();
        let dirty = surface.take_dirty();
        let area = if full { Some(surface.bounds()) } else { dirty };
        let Some(area) = area else {
            return;
        };
        if let Err(e) = presenter.present(&surface, area, self.scale) {
            error!("Present failed: {}", e);
            surface.mark_dirty(area);
        }
    }
}

/// What the window thread reports back to `initialize`
pub type StartupResult = Result<(Arc<dyn Presenter>, Arc<dyn EventPoster>), BackendError>;

/// Fires when dropped, i.e. when the thread function returns or unwinds
struct ExitSignal {
    shared: Arc<Shared>,
    tx: Sender<()>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.shared.set_state(ThreadState::Terminated);
        let _ = self.tx.send(());
    }
}

/// Thread function of the window thread
pub fn run(
    backend: Arc<dyn Backend>,
    config: Config,
    shared: Arc<Shared>,
    startup: SyncSender<StartupResult>,
    exit: Sender<()>,
) {
    let _exit = ExitSignal {
        shared: Arc::clone(&shared),
        tx: exit,
    };

    debug!(
        "Opening {} window {}x{} (scale {})",
        backend.name(),
        config.width,
        config.height,
        config.scale
    );
    let window = match backend.open(&config) {
        Ok(window) => window,
        Err(e) => {
            error!("Failed to create window: {}", e);
            let _ = startup.send(Err(e));
            return;
        }
    };

    let mut pump = window.pump;
    let presenter = window.presenter;
    shared.set_state(ThreadState::Running);
    let delivered = startup
        .send(Ok((Arc::clone(&presenter), window.poster)))
        .is_ok();
    // initialize sets quit before it stops listening, so a late handshake
    // is caught by one of the two checks
    if !delivered || shared.quit.load(Ordering::SeqCst) {
        warn!("Startup handshake abandoned, closing window");
        shared.set_state(ThreadState::ClosePending);
        pump.destroy();
        return;
    }

    let mut handler = Handler {
        shared: &shared,
        presenter: presenter.as_ref(),
    };
    while let Some(event) = pump.next_event() {
        handler.dispatch(event, pump.as_mut());
    }
    debug!("Window event source ended");
}

struct Handler<'a> {
    shared: &'a Shared,
    presenter: &'a dyn Presenter,
}

impl Handler<'_> {
    fn dispatch(&mut self, event: WindowEvent, pump: &mut dyn EventPump) {
        match event {
            WindowEvent::Paint { full } => self.shared.present(self.presenter, full),
            WindowEvent::KeyDown { vk, repeat } => {
                if let Some(key) = Key::from_virtual(vk) {
                    self.on_key(key, repeat, pump);
                }
            }
            WindowEvent::Char { code, repeat } => {
                if let Some(key) = Key::from_char(code) {
                    self.on_key(key, repeat, pump);
                }
            }
            WindowEvent::CloseRequested => self.on_close(pump),
        }
    }

    fn on_key(&mut self, key: Key, repeat: u16, pump: &mut dyn EventPump) {
        for _ in 0..repeat.max(1) {
            if self.shared.keys.push(key).is_err() {
                warn!("Key queue full, dropping {}", key);
                pump.beep();
            }
        }
    }

    fn on_close(&mut self, pump: &mut dyn EventPump) {
        if !self.shared.quit.load(Ordering::Acquire) {
            warn!("Ignoring close request: terminate has not been called");
            return;
        }
        if self.shared.state() == ThreadState::ClosePending {
            return;
        }
        self.shared.set_state(ThreadState::ClosePending);
        pump.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        areas: Mutex<Vec<crate::core::surface::Rect>>,
    }

    impl Presenter for Recorder {
        fn present(
            &self,
            _surface: &Surface,
            area: crate::core::surface::Rect,
            _scale: u32,
        ) -> Result<(), BackendError> {
            self.areas.lock().unwrap().push(area);
            Ok(())
        }
    }

    struct Failing;

    impl Presenter for Failing {
        fn present(
            &self,
            _surface: &Surface,
            _area: crate::core::surface::Rect,
            _scale: u32,
        ) -> Result<(), BackendError> {
            Err(BackendError::Present("device lost".to_string()))
        }
    }

    struct ScriptPump {
        events: Vec<WindowEvent>,
        destroyed: bool,
    }

    impl EventPump for ScriptPump {
        fn next_event(&mut self) -> Option<WindowEvent> {
            if self.destroyed || self.events.is_empty() {
                None
            } else {
                Some(self.events.remove(0))
            }
        }

        fn destroy(&mut self) {
            self.destroyed = true;
        }

        fn beep(&self) {}
    }

    fn ch(code: u32, repeat: u16) -> WindowEvent {
        WindowEvent::Char { code, repeat }
    }

    fn key_down(vk: u16, repeat: u16) -> WindowEvent {
        WindowEvent::KeyDown { vk, repeat }
    }

    fn pump(events: Vec<WindowEvent>) -> ScriptPump {
        ScriptPump {
            events,
            destroyed: false,
        }
    }

    #[test]
    fn test_key_translation_and_repeat() {
        let shared = Shared::new(&Config::with_size(8, 8, 1));
        let recorder = Recorder::default();
        let mut handler = Handler {
            shared: &shared,
            presenter: &recorder,
        };
        let mut pump = pump(vec![]);

        handler.dispatch(ch('x' as u32, 3), &mut pump);
        handler.dispatch(key_down(0x0D, 1), &mut pump);
        // Enter also arrives as a control character; it must not double up
        handler.dispatch(ch(0x0D, 1), &mut pump);
        // Shift is not reported
        handler.dispatch(key_down(0x10, 1), &mut pump);
        // U+2500 would read as the Left arrow
        handler.dispatch(ch(0x2500, 1), &mut pump);

        let keys: Vec<Key> = (0..4).map(|_| shared.keys.pop()).collect();
        assert_eq!(keys, vec![Key('x' as u32), Key('x' as u32), Key('x' as u32), Key::ENTER]);
        assert!(shared.keys.is_empty());
    }

    #[test]
    fn test_unsolicited_close_is_ignored() {
        let shared = Shared::new(&Config::with_size(8, 8, 1));
        let recorder = Recorder::default();
        let mut handler = Handler {
            shared: &shared,
            presenter: &recorder,
        };
        let mut pump = pump(vec![]);

        handler.dispatch(WindowEvent::CloseRequested, &mut pump);
        assert!(!pump.destroyed);

        shared.quit.store(true, Ordering::Release);
        handler.dispatch(WindowEvent::CloseRequested, &mut pump);
        assert!(pump.destroyed);
        assert_eq!(shared.state(), ThreadState::ClosePending);
    }

    #[test]
    fn test_paint_presents_dirty_then_nothing() {
        let shared = Shared::new(&Config::with_size(8, 8, 1));
        let recorder = Recorder::default();
        let mut handler = Handler {
            shared: &shared,
            presenter: &recorder,
        };
        let mut pump = pump(vec![]);

        // Initial surface is fully dirty
        handler.dispatch(WindowEvent::Paint { full: false }, &mut pump);
        shared.surface.lock().draw_point(3, 4);
        handler.dispatch(WindowEvent::Paint { full: false }, &mut pump);
        handler.dispatch(WindowEvent::Paint { full: false }, &mut pump);
        handler.dispatch(WindowEvent::Paint { full: true }, &mut pump);

        use crate::core::surface::Rect;
        let areas = recorder.areas.lock().unwrap().clone();
        assert_eq!(
            areas,
            vec![Rect::new(0, 0, 8, 8), Rect::pixel(3, 4), Rect::new(0, 0, 8, 8)]
        );
        assert_eq!(shared.surface.lock().dirty(), None);
    }

    #[test]
    fn test_failed_present_keeps_region_dirty() {
        let shared = Shared::new(&Config::with_size(8, 8, 1));
        shared.present(&Failing, false);
        assert_eq!(
            shared.surface.lock().dirty(),
            Some(crate::core::surface::Rect::new(0, 0, 8, 8))
        );
    }

    #[test]
    fn test_overflow_beeps() {
        struct CountingPump(std::cell::Cell<usize>);
        impl EventPump for CountingPump {
            fn next_event(&mut self) -> Option<WindowEvent> {
                None
            }
            fn destroy(&mut self) {}
            fn beep(&self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let shared = Shared::new(&Config::with_size(8, 8, 1));
        let recorder = Recorder::default();
        let mut handler = Handler {
            shared: &shared,
            presenter: &recorder,
        };
        let mut pump = CountingPump(std::cell::Cell::new(0));
        handler.dispatch(ch('a' as u32, 40), &mut pump);
        assert_eq!(shared.keys.len(), crate::core::keyqueue::QUEUE_CAPACITY - 1);
        assert_eq!(pump.0.get(), 40 - (crate::core::keyqueue::QUEUE_CAPACITY - 1));
        assert_eq!(shared.keys.pending_permits(), 40);
    }

    #[test]
    fn test_run_reports_open_failure() {
        struct Broken;
        impl Backend for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn open(&self, _config: &Config) -> Result<super::super::NativeWindow, BackendError> {
                Err(BackendError::WindowCreation("no display".to_string()))
            }
        }

        let config = Config::with_size(8, 8, 1);
        let shared = Arc::new(Shared::new(&config));
        let (startup_tx, startup_rx) = std::sync::mpsc::sync_channel(1);
        let (exit_tx, exit_rx) = std::sync::mpsc::channel();
        run(Arc::new(Broken), config, Arc::clone(&shared), startup_tx, exit_tx);

        assert!(matches!(startup_rx.recv().unwrap(), Err(BackendError::WindowCreation(_))));
        assert!(exit_rx.recv().is_ok());
        assert_eq!(shared.state(), ThreadState::Terminated);
    }
}
