//! Signed-in user and role roster.
//!
//! Access is granted by e-mail: a [`Roster`] lists the authorized teacher and
//! student addresses, and a [`Session`] remembers who is signed in under the
//! `userEmail` store key. Matching trims and ignores case.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::store::KeyValueStore;

/// Store key holding the signed-in e-mail.
pub const USER_EMAIL_KEY: &str = "userEmail";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Teacher => f.write_str("teacher"),
            Self::Student => f.write_str("student"),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authorized e-mails per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    teachers: Vec<String>,
    #[serde(default)]
    students: Vec<String>,
}

impl Roster {
    pub fn new<T, S>(teachers: T, students: S) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            teachers: teachers.into_iter().map(|e| normalize(e.as_ref())).collect(),
            students: students.into_iter().map(|e| normalize(e.as_ref())).collect(),
        }
    }

    /// Parse a `{"teachers": [...], "students": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let raw: Roster =
            serde_json::from_str(json).map_err(|e| SessionError::InvalidRoster(e.to_string()))?;
        Ok(Self::new(raw.teachers, raw.students))
    }

    /// Teachers win when an address appears in both lists.
    pub fn role_of(&self, email: &str) -> Option<Role> {
        let email = normalize(email);
        if email.is_empty() {
            return None;
        }
        if self.teachers.contains(&email) {
            Some(Role::Teacher)
        } else if self.students.contains(&email) {
            Some(Role::Student)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedInUser {
    pub email: String,
    pub role: Role,
}

/// Page-level sign-in state backed by a [`KeyValueStore`].
pub struct Session {
    store: Rc<dyn KeyValueStore>,
    roster: Roster,
    user: Option<SignedInUser>,
}

impl Session {
    /// Resume the stored sign-in, dropping it if the roster no longer
    /// authorizes that address.
    pub fn restore(store: Rc<dyn KeyValueStore>, roster: Roster) -> Result<Self, SessionError> {
        let user = match store.get(USER_EMAIL_KEY)? {
            Some(email) => match roster.role_of(&email) {
                Some(role) => Some(SignedInUser { email, role }),
                None => {
                    warn!("Stored sign-in is no longer authorized");
                    store.remove(USER_EMAIL_KEY)?;
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            store,
            roster,
            user,
        })
    }

    pub fn current(&self) -> Option<&SignedInUser> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    /// Sign in as `email`. Unknown addresses leave the session untouched.
    pub fn login(&mut self, email: &str) -> Result<&SignedInUser, SessionError> {
        let email = email.trim();
        let role = self
            .roster
            .role_of(email)
            .ok_or_else(|| SessionError::NotAuthorized(email.to_string()))?;

        self.store.set(USER_EMAIL_KEY, email)?;
        info!(%role, "Signed in");
        Ok(&*self.user.insert(SignedInUser {
            email: email.to_string(),
            role,
        }))
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.store.remove(USER_EMAIL_KEY)?;
        if self.user.take().is_some() {
            info!("Signed out");
        }
        Ok(())
    }
}
