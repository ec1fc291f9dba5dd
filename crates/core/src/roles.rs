//! Well-known role name constants carried in access-token claims.

/// Store operators: may list and force-release any resource's locks.
pub const ROLE_ADMIN: &str = "admin";

/// The storefront backend itself, reporting order lifecycle events on behalf
/// of any customer.
pub const ROLE_SERVICE: &str = "service";
