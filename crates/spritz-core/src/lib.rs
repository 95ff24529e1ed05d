//! # Spritz Core
//!
//! Core library for encrnote — the Spritz stream cipher/hash primitive
//! (Rivest–Schuldt, 2014) together with a password-keyed stream construction
//! and a versioned encrypted-file envelope built on top of it.
//!
//! ## Architecture
//!
//! - **engine**: the 256-byte permutation state and its primitives
//! - **hash**: fixed-length digests via the sponge
//! - **stream**: password+IV keyed streams and the I/O wrappers
//! - **envelope**: the on-disk header format (legacy read, current read/write)
//! - **error**: error kinds surfaced to callers
//!
//! ## Security model
//!
//! Spritz is a research cipher and deliberately variable-time; this crate
//! makes no constant-time or side-channel claims. What it does guarantee:
//! wrong passwords and corrupted headers are detected before any payload is
//! surfaced, key material is zeroized on drop, and a failing entropy source
//! is an error, never a fallback.

pub mod engine;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod stream;

pub use engine::Spritz;
pub use envelope::{wrap_reader, wrap_writer, wrap_writer_with_rng};
pub use error::{Result, SpritzError};
pub use hash::sum;
pub use stream::{new_stream, StreamReader, StreamWriter};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
