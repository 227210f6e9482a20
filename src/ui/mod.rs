//! ui
//!
//! User interaction utilities.
//!
//! All terminal output goes through [`output`] so that the quiet flag and
//! formatting are handled in one place.

pub mod output;
