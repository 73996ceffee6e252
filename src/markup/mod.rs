//! Question markup: prose interleaved with LaTeX math and embedded diagrams.
//!
//! 1. [`tokenizer`] — content string → ordered [`ContentSegment`]s
//! 2. [`math`]      — LaTeX fragment → MathML, behind the [`MathEngine`] trait

pub mod math;
pub mod tokenizer;

pub use math::{DisplayMode, MathEngine, MathMlEngine};
pub use tokenizer::{reconstruct, tokenize, ContentSegment};
