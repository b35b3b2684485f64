//! In-memory backend.
//!
//! Stands in for the native window: presents into a screen buffer and takes
//! its input from a [`HeadlessHandle`], which plays the part of the user.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::{Backend, EventPoster, EventPump, NativeWindow, Presenter, WindowEvent};
use crate::config::Config;
use crate::core::surface::{Rect, Surface};
use crate::error::BackendError;

/// What the fake display looks like
#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

#[derive(Default)]
struct Inner {
    fail_open: AtomicBool,
    open_delay: Mutex<Option<Duration>>,
    events: Mutex<Option<Sender<WindowEvent>>>,
    screen: Mutex<Screen>,
    opens: AtomicUsize,
    presents: AtomicUsize,
    beeps: AtomicUsize,
    destroyed: AtomicBool,
}

impl Inner {
    fn sender(&self) -> Option<Sender<WindowEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Backend whose display is a `Vec<u32>`
#[derive(Clone)]
pub struct HeadlessBackend {
    inner: Arc<Inner>,
}

/// Test-side controls of a [`HeadlessBackend`]
#[derive(Clone)]
pub struct HeadlessHandle {
    inner: Arc<Inner>,
}

impl HeadlessBackend {
    pub fn new() -> (Self, HeadlessHandle) {
        let inner = Arc::new(Inner::default());
        (
            Self {
                inner: Arc::clone(&inner),
            },
            HeadlessHandle { inner },
        )
    }
}

impl Backend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn open(&self, config: &Config) -> Result<NativeWindow, BackendError> {
        let delay = *self.inner.open_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if self.inner.fail_open.load(Ordering::Acquire) {
            return Err(BackendError::WindowCreation("headless open refused".to_string()));
        }

        let (tx, rx) = mpsc::channel();
        {
            let mut screen = self.inner.screen.lock().unwrap_or_else(PoisonError::into_inner);
            screen.width = config.width * config.scale;
            screen.height = config.height * config.scale;
            screen.pixels = vec![0; screen.width as usize * screen.height as usize];
        }
        *self.inner.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx.clone());
        self.inner.destroyed.store(false, Ordering::Release);
        self.inner.opens.fetch_add(1, Ordering::AcqRel);

        Ok(NativeWindow {
            pump: Box::new(HeadlessPump {
                rx,
                inner: Arc::clone(&self.inner),
                destroyed: false,
            }),
            presenter: Arc::new(HeadlessPresenter {
                inner: Arc::clone(&self.inner),
            }),
            poster: Arc::new(HeadlessPoster { tx: Mutex::new(tx) }),
        })
    }
}

struct HeadlessPump {
    rx: Receiver<WindowEvent>,
    inner: Arc<Inner>,
    destroyed: bool,
}

impl EventPump for HeadlessPump {
    fn next_event(&mut self) -> Option<WindowEvent> {
        if self.destroyed {
            return None;
        }
        self.rx.recv().ok()
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        *self.inner.events.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.destroyed.store(true, Ordering::Release);
    }

    fn beep(&self) {
        self.inner.beeps.fetch_add(1, Ordering::AcqRel);
    }
}

struct HeadlessPresenter {
    inner: Arc<Inner>,
}

impl Presenter for HeadlessPresenter {
    fn present(&self, surface: &Surface, area: Rect, scale: u32) -> Result<(), BackendError> {
        let mut screen = self.inner.screen.lock().unwrap_or_else(PoisonError::into_inner);
        if screen.width != surface.width() * scale || screen.height != surface.height() * scale {
            return Err(BackendError::Present(format!(
                "screen is {}x{}, surface needs {}x{}",
                screen.width,
                screen.height,
                surface.width() * scale,
                surface.height() * scale
            )));
        }
        surface.blit_scaled(area, scale, &mut screen.pixels);
        self.inner.presents.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

struct HeadlessPoster {
    tx: Mutex<Sender<WindowEvent>>,
}

impl EventPoster for HeadlessPoster {
    fn post(&self, event: WindowEvent) -> Result<(), BackendError> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event)
            .map_err(|_| BackendError::Disconnected)
    }
}

impl HeadlessHandle {
    /// Make the next `open` fail (or succeed again)
    pub fn fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::Release);
    }

    /// Stall `open` to simulate a window thread that never reports back
    pub fn delay_open(&self, delay: Option<Duration>) {
        *self.inner.open_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Inject an event as if the user produced it. Returns false when no
    /// window is open.
    pub fn post(&self, event: WindowEvent) -> bool {
        match self.inner.sender() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn press_char(&self, c: char) -> bool {
        self.post(WindowEvent::Char {
            code: c as u32,
            repeat: 1,
        })
    }

    pub fn press_key(&self, vk: u16) -> bool {
        self.post(WindowEvent::KeyDown { vk, repeat: 1 })
    }

    pub fn type_text(&self, text: &str) -> bool {
        text.chars().all(|c| self.press_char(c))
    }

    /// The user clicking the close box
    pub fn request_close(&self) -> bool {
        self.post(WindowEvent::CloseRequested)
    }

    pub fn paint(&self, full: bool) -> bool {
        self.post(WindowEvent::Paint { full })
    }

    pub fn screen(&self) -> Screen {
        self.inner.screen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn screen_pixel(&self, x: u32, y: u32) -> Option<u32> {
        let screen = self.inner.screen.lock().unwrap_or_else(PoisonError::into_inner);
        if x >= screen.width || y >= screen.height {
            return None;
        }
        screen.pixels.get((y * screen.width + x) as usize).copied()
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::Acquire)
    }

    pub fn presents(&self) -> usize {
        self.inner.presents.load(Ordering::Acquire)
    }

    pub fn beeps(&self) -> usize {
        self.inner.beeps.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Poll `cond` until it holds or `timeout` passes
    pub fn wait_until(&self, timeout: Duration, mut cond: impl FnMut(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if cond(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::{Color, Palette};

    #[test]
    fn test_open_sizes_screen_and_routes_events() {
        let (backend, handle) = HeadlessBackend::new();
        let mut window = backend.open(&Config::with_size(4, 3, 2)).unwrap();
        assert_eq!(handle.opens(), 1);
        let screen = handle.screen();
        assert_eq!((screen.width, screen.height), (8, 6));

        assert!(handle.press_char('k'));
        window.poster.post(WindowEvent::CloseRequested).unwrap();
        assert_eq!(
            window.pump.next_event(),
            Some(WindowEvent::Char {
                code: 'k' as u32,
                repeat: 1,
            })
        );
        assert_eq!(window.pump.next_event(), Some(WindowEvent::CloseRequested));

        window.pump.destroy();
        assert!(handle.is_destroyed());
        assert_eq!(window.pump.next_event(), None);
        assert!(!handle.press_char('z'));
    }

    #[test]
    fn test_present_scales() {
        let (backend, handle) = HeadlessBackend::new();
        let window = backend.open(&Config::with_size(4, 3, 2)).unwrap();
        let mut surface = Surface::new(4, 3);
        surface.set_pen(Color::Palette(Palette::Green));
        surface.draw_point(1, 1);
        window.presenter.present(&surface, surface.bounds(), 2).unwrap();

        let green = Palette::Green.rgb();
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            assert_eq!(handle.screen_pixel(x, y), Some(green));
        }
        assert_eq!(handle.screen_pixel(1, 2), Some(0));
        assert_eq!(handle.screen_pixel(8, 0), None);
        assert_eq!(handle.presents(), 1);
    }

    #[test]
    fn test_fail_open() {
        let (backend, handle) = HeadlessBackend::new();
        handle.fail_open(true);
        assert!(backend.open(&Config::default()).is_err());
        handle.fail_open(false);
        assert!(backend.open(&Config::default()).is_ok());
    }
}
