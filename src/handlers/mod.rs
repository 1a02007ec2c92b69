//! Route handlers, one module per entity.
//!
//! Every handler returns `AppResult`: success and failure both leave as an
//! envelope, with the status and message the storefront clients expect.

pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

/// Treats an absent and a blank string the same way.
pub(crate) fn not_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
