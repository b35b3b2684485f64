//! Mutual exclusion around the drawing surface.
//!
//! [`SurfaceGuard`] wraps the surface in a mutex and additionally tracks
//! whether a holder is inside the critical section. Finding the section
//! already occupied on entry means two threads overlapped; that is counted
//! and logged so tests can assert it never happens.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::surface::Surface;

pub struct SurfaceGuard {
    surface: Mutex<Surface>,
    occupied: AtomicBool,
    overlaps: AtomicUsize,
    acquisitions: AtomicUsize,
}

impl SurfaceGuard {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface: Mutex::new(surface),
            occupied: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// Enter the critical section. A panic inside a previous holder does
    /// not lock the surface out: the poisoned state is recovered.
    pub fn lock(&self) -> SurfaceLock<'_> {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        if self.occupied.swap(true, Ordering::AcqRel) {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Surface guard entered while already held");
        }
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        SurfaceLock {
            surface,
            guard: self,
        }
    }

    /// Times the critical section was found occupied on entry
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::Relaxed)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

/// RAII access to the surface; leaving the scope releases the guard
pub struct SurfaceLock<'a> {
    surface: MutexGuard<'a, Surface>,
    guard: &'a SurfaceGuard,
}

impl Deref for SurfaceLock<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        &self.surface
    }
}

impl DerefMut for SurfaceLock<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }
}

impl Drop for SurfaceLock<'_> {
    fn drop(&mut self) {
        // Runs before the MutexGuard field is dropped
        self.guard.occupied.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::{Color, Palette};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_draws_do_not_overlap() {
        let guard = Arc::new(SurfaceGuard::new(Surface::new(64, 8)));
        let colors = [Palette::Red, Palette::Green, Palette::Blue, Palette::Yellow];

        let handles: Vec<_> = colors
            .iter()
            .map(|&color| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || {
                    for i in 0..200 {
                        let y = i % 8;
                        let mut surface = guard.lock();
                        surface.set_pen(Color::Palette(color));
                        surface.draw_line(0, y, 64, y);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(guard.overlaps(), 0);
        assert_eq!(guard.acquisitions(), colors.len() * 200);

        // Each row was last written by a single draw call: no torn lines
        let surface = guard.lock();
        for y in 0..8 {
            let first = surface.pixel(0, y).unwrap();
            assert!((0..64).all(|x| surface.pixel(x, y) == Some(first)));
            assert!(colors.iter().any(|c| c.rgb() == first));
        }
    }

    #[test]
    fn test_guard_survives_panicking_holder() {
        let guard = Arc::new(SurfaceGuard::new(Surface::new(4, 4)));
        let g = Arc::clone(&guard);
        let result = thread::spawn(move || {
            let mut surface = g.lock();
            surface.draw_point(0, 0);
            panic!("drawing failed");
        })
        .join();
        assert!(result.is_err());

        let surface = guard.lock();
        assert_eq!(surface.pixel(0, 0), Some(Palette::White.rgb()));
        drop(surface);
        assert_eq!(guard.overlaps(), 0);
    }
}
