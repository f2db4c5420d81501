//! # skylark_core
//!
//! Client session domain logic for Skylark: credential persistence, auth
//! state management, idle-activity monitoring, and route guards.

pub mod activity;
pub mod models;
pub mod routes;
pub mod session;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
