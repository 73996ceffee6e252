//! Driver stages that turn a PDF into page images for the extraction client.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ (client)
//! (path/bytes) (pdfium) (base64 PNG)
//! ```
//!
//! 1. [`input`]  — validate a local path or stage uploaded bytes in a temp dir
//! 2. [`render`] — rasterise pages on the blocking pool, one at a time
//! 3. [`encode`] — PNG-encode and base64-wrap each page for the request body
//!
//! The network call itself lives in [`crate::client`] and [`crate::backend`].

pub mod encode;
pub mod input;
pub mod render;
