//! In-memory user directory keyed by user name

use crate::domain::user::User;
use crate::infra::error::{Result, TourGuideError};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct UserDirectory {
    users: RwLock<FxHashMap<String, Arc<User>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user unless the name is taken. The first registration wins.
    pub fn register(&self, user: Arc<User>) -> bool {
        let mut users = self.users.write();
        if users.contains_key(user.name()) {
            debug!(user = %user.name(), "user_already_registered");
            return false;
        }
        users.insert(user.name().to_string(), user);
        true
    }

    pub fn get(&self, name: &str) -> Result<Arc<User>> {
        self.users.read().get(name).cloned().ok_or_else(|| TourGuideError::not_found(name))
    }

    /// Point-in-time snapshot; later registrations do not show up in it
    pub fn list_all(&self) -> Vec<Arc<User>> {
        self.users.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::UserId;

    fn user(name: &str, phone: &str) -> Arc<User> {
        Arc::new(User::new(UserId::random(), name, phone, &format!("{name}@tourGuide.com")))
    }

    #[test]
    fn test_register_and_get() {
        let directory = UserDirectory::new();
        assert!(directory.is_empty());

        assert!(directory.register(user("jon", "000")));
        assert!(directory.register(user("jon2", "000")));

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("jon").unwrap().name(), "jon");
    }

    #[test]
    fn test_first_registration_wins() {
        let directory = UserDirectory::new();
        assert!(directory.register(user("jon", "first")));
        assert!(!directory.register(user("jon", "second")));

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.get("jon").unwrap().phone_number(), "first");
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let directory = UserDirectory::new();
        let err = directory.get("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_all_is_a_snapshot() {
        let directory = UserDirectory::new();
        directory.register(user("a", "000"));
        let snapshot = directory.list_all();

        directory.register(user("b", "000"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(directory.list_all().len(), 2);
    }
}
