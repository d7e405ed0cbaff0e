// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::{Role, SessionUser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

impl Session {
    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Durable home for the signed-in session.
pub trait SessionStore {
    fn read(&self) -> Result<Option<Session>>;
    fn write(&self, session: &Session) -> Result<()>;
    fn erase(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: RefCell<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn read(&self) -> Result<Option<Session>> {
        Ok(self.slot.borrow().clone())
    }

    fn write(&self, session: &Session) -> Result<()> {
        *self.slot.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        self.slot.borrow_mut().take();
        Ok(())
    }
}

/// The only reader of session storage. Everything else asks the context.
#[derive(Debug)]
pub struct SessionContext<S: SessionStore> {
    store: S,
    current: Option<Session>,
}

impl<S: SessionStore> SessionContext<S> {
    /// Restores whatever the store holds. A corrupt store is treated as
    /// signed out.
    pub fn open(store: S) -> Self {
        let current = match store.read() {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "ignoring unreadable session");
                None
            }
        };
        Self { store, current }
    }

    pub fn get(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|session| session.token.as_str())
    }

    pub fn set(&mut self, session: Session) -> Result<()> {
        self.store.write(&session)?;
        tracing::info!(user = %session.user.username, role = session.user.role.as_str(), "session stored");
        self.current = Some(session);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.current = None;
        self.store.erase()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    fn session() -> Session {
        Session {
            token: "jwt-token".to_owned(),
            user: SessionUser {
                id: UserId::new("7"),
                username: "inspector1".to_owned(),
                email: "inspector1@example.com".to_owned(),
                role: Role::Inspector,
                first_name: "Luis".to_owned(),
                last_name: "Mora".to_owned(),
            },
        }
    }

    #[test]
    fn set_and_clear_go_through_the_store() {
        let mut context = SessionContext::open(MemorySessionStore::default());
        assert!(context.get().is_none());

        context.set(session()).expect("store session");
        assert_eq!(context.token(), Some("jwt-token"));
        assert_eq!(context.store().read().expect("read").map(|s| s.role()), Some(Role::Inspector));

        context.clear().expect("clear session");
        assert!(context.get().is_none());
        assert!(context.store().read().expect("read").is_none());
    }

    #[test]
    fn open_restores_stored_session() {
        let store = MemorySessionStore::default();
        store.write(&session()).expect("seed store");
        let context = SessionContext::open(store);
        assert_eq!(
            context.get().map(|session| session.user.display_name()),
            Some("Luis Mora".to_owned())
        );
    }
}
