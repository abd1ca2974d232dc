//! Who is acting. Authentication happens elsewhere; the services only need
//! the current user id (for `createdBy` / `driverUid` defaults) and a role
//! for dashboard gating.

use oiltrack_core::{Area, Role, ANONYMOUS_USER};

pub trait Identity: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    fn role(&self) -> Option<Role>;

    /// Current user id, or `anonymous` when nobody is signed in.
    fn user_or_anonymous(&self) -> String {
        self.current_user_id()
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string())
    }

    fn can_access(&self, area: Area) -> bool {
        self.role().is_some_and(|role| role.can_access(area))
    }
}

/// A fixed signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    pub uid: String,
    pub role: Role,
}

impl StaticIdentity {
    pub fn new(uid: impl Into<String>, role: Role) -> Self {
        StaticIdentity {
            uid: uid.into(),
            role,
        }
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        Some(self.uid.clone())
    }

    fn role(&self) -> Option<Role> {
        Some(self.role)
    }
}

/// Nobody signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn current_user_id(&self) -> Option<String> {
        None
    }

    fn role(&self) -> Option<Role> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_fallback() {
        assert_eq!(AnonymousIdentity.user_or_anonymous(), "anonymous");
        assert!(!AnonymousIdentity.can_access(Area::Driver));

        let blank = StaticIdentity::new("  ", Role::Driver);
        assert_eq!(blank.user_or_anonymous(), "anonymous");
    }

    #[test]
    fn test_role_gating() {
        let driver = StaticIdentity::new("driver-7", Role::Driver);
        assert_eq!(driver.user_or_anonymous(), "driver-7");
        assert!(driver.can_access(Area::Driver));
        assert!(!driver.can_access(Area::Admin));

        let admin = StaticIdentity::new("admin-1", Role::Admin);
        assert!(admin.can_access(Area::Business));
    }
}
