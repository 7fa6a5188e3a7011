//! Camera Stream Control
//!
//! Owns the one live video stream a session may have open against the
//! detector backend. The backend only runs detection while the stream is
//! being consumed, so "showing" the stream means keeping a task that
//! pulls its body.

mod controller;

pub use controller::{StreamController, StreamHandle};

/// Identifier of the hidden surface the stream is bound to
pub const STREAM_ELEMENT_ID: &str = "backend-camera-stream";
