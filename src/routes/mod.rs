/// Router Module Index
///
/// Splits the entity routes into three access tiers. `create_router` wraps the
/// authenticated and admin tiers in their gate middleware before merging them, so a
/// route's tier is decided by the module it is registered in.

/// Routes open to anonymous clients.
pub mod public;

/// Routes behind the Authentication Gate.
pub mod authenticated;

/// Routes behind the Authentication and Authorization Gates.
pub mod admin;
