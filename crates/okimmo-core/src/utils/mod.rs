//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, mask_token, preview_token, truncate_string, NOT_AVAILABLE};
