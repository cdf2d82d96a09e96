//! Well-known role name constants.
//!
//! These must match the `role` column values issued by the auth service.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Whether `role` grants access to the organisation-wide security feed.
pub fn is_privileged(role: &str) -> bool {
    role == ROLE_ADMIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_is_privileged() {
        assert!(is_privileged(ROLE_ADMIN));
        assert!(!is_privileged(ROLE_USER));
        assert!(!is_privileged("Admin"));
        assert!(!is_privileged(""));
    }
}
