//! Core application types for Prism
//!
//! - [`PrismError`] - failures outside the template engine (configuration,
//!   render data), plus a transparent wrapper for [`TemplateError`]
//! - [`ErrorContext`] - an error with the details and suggestion shown to
//!   CLI users
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] into an
//!   [`ErrorContext`]
//!
//! [`TemplateError`]: crate::templating::TemplateError

pub mod error;

pub use error::{ErrorContext, PrismError, user_friendly_error};
