//! Error types shared by the lifecycle controller and the window backends.

use std::io;
use thiserror::Error;

/// Failures raised by a window backend while creating or presenting.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to register window class: {0}")]
    ClassRegistration(String),

    #[error("Failed to create window: {0}")]
    WindowCreation(String),

    #[error("Failed to present surface: {0}")]
    Present(String),

    #[error("Failed to post window event: the window is gone")]
    Disconnected,

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Errors returned by [`Lab`](crate::Lab).
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Window initialization failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to spawn window thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    #[error("Session is already initialized")]
    AlreadyInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Window thread panicked")]
    WindowThreadPanicked,
}

pub type Result<T> = std::result::Result<T, LabError>;
