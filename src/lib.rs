//! Core engine for a VSRG chart editor: a concurrent note store, an
//! activation windowing layer, and a multi-threaded vertex emission
//! pipeline.
//!
//! This crate does not parse chart files, decode video, spawn FFmpeg, or
//! draw a single pixel to screen. It owns note records, answers ordered
//! range queries over them, and turns the notes visible in a viewport into
//! packed vertex bytes that a host renderer can upload as-is.

pub mod bitio;
pub mod config;
pub mod error;
pub mod executor;
pub mod external;
pub mod ffi;
pub mod layout;
pub mod note;
pub mod timing;
pub mod activation;
pub mod sprite;
pub mod emission;

pub use error::CoreError;
pub use note::{Note, NoteSide, NoteType};
pub use timing::TimingPoint;
