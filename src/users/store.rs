//! In-memory user collection.
//!
//! # Design Decisions
//! - A single mutex guards the list and the id counter; it is held only for
//!   synchronous work, never across an await
//! - Ids come from a high-water mark, so an id is never handed out twice even
//!   after the highest one is deleted

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::users::model::{NewUser, User, UserPatch};

/// Errors from user collection operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `name` or `email` missing or empty.
    #[error("name and email required")]
    Validation,

    /// No user with this id.
    #[error("User not found")]
    NotFound(u64),
}

struct Inner {
    users: Vec<User>,
    next_id: u64,
}

/// Ordered, process-local collection of users.
pub struct UserStore {
    inner: Mutex<Inner>,
}

impl UserStore {
    /// An empty collection; the first user gets id 1.
    pub fn new() -> Self {
        Self::with_users(Vec::new())
    }

    /// The two demo users, Alice (1) and Bob (2).
    pub fn seeded() -> Self {
        Self::with_users(vec![
            User {
                id: 1,
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            },
            User {
                id: 2,
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            },
        ])
    }

    /// A collection starting from `users`, in the given order.
    pub fn with_users(users: Vec<User>) -> Self {
        let next_id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(Inner { users, next_id }),
        }
    }

    /// All users in insertion order.
    pub fn list(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    /// Append a new user with the next id.
    pub fn create(&self, input: NewUser) -> Result<User, StoreError> {
        let (name, email) = match (non_empty(input.name), non_empty(input.email)) {
            (Some(name), Some(email)) => (name, email),
            _ => return Err(StoreError::Validation),
        };

        let mut inner = self.lock();
        let user = User {
            id: inner.next_id,
            name,
            email,
        };
        inner.next_id += 1;
        inner.users.push(user.clone());
        Ok(user)
    }

    /// Merge `patch` into the user with `id`.
    pub fn update(&self, id: u64, patch: UserPatch) -> Result<User, StoreError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound(id))?;
        user.apply(patch);
        Ok(user.clone())
    }

    /// Remove and return the user with `id`.
    pub fn remove(&self, id: u64) -> Result<User, StoreError> {
        let mut inner = self.lock();
        let index = inner
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(inner.users.remove(index))
    }

    pub fn len(&self) -> usize {
        self.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_id_is_one() {
        let store = UserStore::new();
        let user = store.create(NewUser::new("Carl", "c@example.com")).unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Carl".into(),
                email: "c@example.com".into()
            }
        );
    }

    #[test]
    fn test_seeded_continues_after_max() {
        let store = UserStore::seeded();
        assert_eq!(store.len(), 2);
        let user = store.create(NewUser::new("Dana", "d@example.com")).unwrap();
        assert_eq!(user.id, 3);
    }

    #[test]
    fn test_missing_fields_do_not_mutate() {
        let store = UserStore::seeded();
        let cases = [
            NewUser::default(),
            NewUser {
                name: Some("Eve".into()),
                email: None,
            },
            NewUser {
                name: None,
                email: Some("e@example.com".into()),
            },
            NewUser::new("", "e@example.com"),
        ];

        for case in cases {
            assert_eq!(store.create(case), Err(StoreError::Validation));
        }
        assert_eq!(store.list(), UserStore::seeded().list());
    }

    #[test]
    fn test_ids_never_reused_after_delete() {
        let store = UserStore::new();
        let mut issued = Vec::new();

        for round in 0..20 {
            let user = store
                .create(NewUser::new(format!("u{round}"), "x@example.com"))
                .unwrap();
            issued.push(user.id);

            // Delete the newest user every third round, including the current maximum.
            if round % 3 == 0 {
                store.remove(user.id).unwrap();
            }
        }

        assert!(issued.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {issued:?}");
    }

    #[test]
    fn test_update_merges_and_keeps_id() {
        let store = UserStore::seeded();
        let updated = store
            .update(
                1,
                UserPatch {
                    name: Some("Alicia".into()),
                    email: None,
                },
            )
            .unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "alice@example.com");
        assert_eq!(store.list()[0], updated);
    }

    #[test]
    fn test_unknown_id_does_not_mutate() {
        let store = UserStore::seeded();
        let before = store.list();

        assert_eq!(
            store.update(99, UserPatch { name: Some("X".into()), email: None }),
            Err(StoreError::NotFound(99))
        );
        assert_eq!(store.remove(99), Err(StoreError::NotFound(99)));
        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_remove_returns_record() {
        let store = UserStore::seeded();
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.name, "Alice");
        assert!(store.list().iter().all(|u| u.id != 1));
    }

    #[test]
    fn test_concurrent_creates_get_distinct_ids() {
        let store = Arc::new(UserStore::new());
        let threads: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .create(NewUser::new(format!("user{i}"), "x@example.com"))
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids: Vec<u64> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }
}
