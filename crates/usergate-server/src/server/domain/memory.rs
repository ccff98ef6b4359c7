//! In-process [`UserRegistry`] backed by ordered maps.

use super::{NewUser, User, UserChanges, UserRegistry};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use usergate_core::{
    Error, Result,
    types::{UserId, UserStatus, epoch_seconds},
};

#[derive(Default)]
struct Inner {
    last_id: UserId,
    users: BTreeMap<UserId, User>,
    emails: HashMap<String, UserId>,
}

impl Inner {
    fn visible_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users
            .get_mut(&id)
            .filter(|user| !user.status.is_deleted())
            .ok_or(Error::NotFound { id })
    }

    fn modifiable_mut(&mut self, id: UserId) -> Result<&mut User> {
        let user = self.users.get_mut(&id).ok_or(Error::NotFound { id })?;
        if user.status.is_deleted() {
            return Err(Error::InvalidState {
                reason: format!("Deleted user cannot be modified: id={id}"),
            });
        }
        Ok(user)
    }
}

/// Thread-safe in-memory user store. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct InMemoryUserRegistry {
    inner: RwLock<Inner>,
}

impl UserRegistry for InMemoryUserRegistry {
    fn create(&self, new_user: NewUser) -> Result<User> {
        let mut inner = self.inner.write();

        if inner.emails.contains_key(&new_user.email) {
            tracing::warn!(email = %new_user.email, "Duplicate email");
            return Err(Error::DuplicateKey {
                key: new_user.email,
            });
        }

        inner.last_id += 1;
        let now = epoch_seconds();
        let user = User {
            id: inner.last_id,
            email: new_user.email,
            name: new_user.name,
            phone_number: new_user.phone_number,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());

        tracing::info!(id = user.id, email = %user.email, "User created");
        Ok(user)
    }

    fn get_by_id(&self, id: UserId) -> Result<User> {
        self.inner
            .read()
            .users
            .get(&id)
            .filter(|user| !user.status.is_deleted())
            .cloned()
            .ok_or(Error::NotFound { id })
    }

    fn list_all(&self) -> Vec<User> {
        self.inner
            .read()
            .users
            .values()
            .filter(|user| !user.status.is_deleted())
            .cloned()
            .collect()
    }

    fn update(&self, id: UserId, changes: UserChanges) -> Result<User> {
        let mut inner = self.inner.write();
        let user = inner.modifiable_mut(id)?;
        user.name = changes.name;
        user.phone_number = changes.phone_number;
        user.updated_at = epoch_seconds();

        tracing::info!(id, "User updated");
        Ok(user.clone())
    }

    fn delete(&self, id: UserId) -> Result<()> {
        let mut inner = self.inner.write();
        let user = inner.visible_mut(id)?;
        user.status = UserStatus::Deleted;
        user.updated_at = epoch_seconds();

        tracing::info!(id, "User deleted");
        Ok(())
    }

    fn update_status(&self, id: UserId, status: UserStatus) -> Result<User> {
        let mut inner = self.inner.write();
        let user = inner.modifiable_mut(id)?;
        user.status = status;
        user.updated_at = epoch_seconds();

        tracing::info!(id, %status, "User status changed");
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn registry_with(emails: &[&str]) -> InMemoryUserRegistry {
        let registry = InMemoryUserRegistry::default();
        for email in emails {
            registry.create(NewUser::new(*email, "User", "")).unwrap();
        }
        registry
    }

    #[test]
    fn create_assigns_active_status_and_fresh_ids() -> Result<()> {
        let registry = InMemoryUserRegistry::default();
        let a = registry.create(NewUser::new("a@x.com", "A", ""))?;
        let b = registry.create(NewUser::new("b@x.com", "B", "010-1234-5678"))?;

        assert_eq!(a.status, UserStatus::Active);
        assert_eq!(a.phone_number, None);
        assert_eq!(b.phone_number.as_deref(), Some("010-1234-5678"));
        assert_ne!(a.id, b.id);
        Ok(())
    }

    #[test]
    fn duplicate_email_is_rejected_without_new_record() {
        let registry = registry_with(&["a@x.com"]);

        let err = registry
            .create(NewUser::new("a@x.com", "Again", ""))
            .unwrap_err();

        assert_eq!(
            err,
            Error::DuplicateKey {
                key: "a@x.com".to_string()
            }
        );
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn soft_deleted_users_are_hidden_but_keep_their_email() -> Result<()> {
        let registry = registry_with(&["a@x.com", "b@x.com"]);
        registry.delete(1)?;

        assert_eq!(registry.get_by_id(1), Err(Error::NotFound { id: 1 }));
        assert_eq!(
            registry.list_all().iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(registry.delete(1), Err(Error::NotFound { id: 1 }));
        assert!(matches!(
            registry.create(NewUser::new("a@x.com", "A", "")),
            Err(Error::DuplicateKey { .. })
        ));
        Ok(())
    }

    #[test]
    fn update_rejects_unknown_and_deleted_users() -> Result<()> {
        let registry = registry_with(&["a@x.com"]);

        let updated = registry.update(1, UserChanges::new("Renamed", "02-123-4567"))?;
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.phone_number.as_deref(), Some("02-123-4567"));

        assert_eq!(
            registry.update(9, UserChanges::new("X", "")),
            Err(Error::NotFound { id: 9 })
        );

        registry.delete(1)?;
        assert!(matches!(
            registry.update(1, UserChanges::new("X", "")),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            registry.update_status(1, UserStatus::Active),
            Err(Error::InvalidState { .. })
        ));
        Ok(())
    }

    #[test]
    fn update_status_to_deleted_is_a_soft_delete() -> Result<()> {
        let registry = registry_with(&["a@x.com"]);

        let suspended = registry.update_status(1, UserStatus::Suspended)?;
        assert_eq!(suspended.status, UserStatus::Suspended);
        assert_eq!(registry.list_all().len(), 1);

        registry.update_status(1, UserStatus::Deleted)?;
        assert!(registry.list_all().is_empty());
        Ok(())
    }

    #[test]
    fn concurrent_creates_get_unique_ids() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            registry
                                .create(NewUser::new(format!("{t}-{i}@x.com"), "U", ""))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<UserId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 400);
    }
}
