//! Shared state passed between the application and the window thread.
//!
//! - **keyqueue**: bounded key ring with a counting semaphore
//! - **surface**: off-screen pixel buffer, primitives and dirty tracking
//! - **guard**: the lock every surface access goes through
//! - **color** / **key**: value types crossing the public API
//!
//! # Ownership
//!
//! ```text
//! Session
//! ├── SurfaceGuard ── Surface (pixels + pen + dirty rect)
//! └── KeyQueue (ring + Semaphore)
//! ```

pub mod color;
pub mod guard;
pub mod key;
pub mod keyqueue;
pub mod surface;
