//! Utility functions for common operations.
//!
//! - **URL validation**: links from feed data are checked before they are
//!   handed to the system opener
//! - **Text processing**: Unicode-aware width calculation, truncation and
//!   terminal sanitizing

mod text;
mod url_validator;

pub use text::{display_width, format_relative_time, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url_for_open, UrlValidationError};

/// Maximum allowed search query length.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
