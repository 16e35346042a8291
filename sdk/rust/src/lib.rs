//! Typed client for the API relay admin and proxy surfaces.

mod client;

pub use client::{ClientError, Envelope, RelayClient};
