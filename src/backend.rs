//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimesection.
//
// Mimesection is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mimesection is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimesection. If not, see <http://www.gnu.org/licenses/>.

//! The authentication seam of a server built around section extraction.
//!
//! Nothing in this crate authenticates anyone; a server embedding it supplies
//! a `Backend` and gets a user handle back from a successful login.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoginError {
    /// The user name or password is wrong.
    ///
    /// Deliberately does not say which.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoginError {
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(*self, LoginError::InvalidCredentials)
    }
}

/// A source of users.
pub trait Backend {
    type User;

    /// Authenticate `username` with `password`.
    ///
    /// `remote_addr` identifies the peer for logging and rate limiting.
    /// Returns `LoginError::InvalidCredentials` if the user name or password
    /// is incorrect.
    fn login(
        &self,
        remote_addr: &str,
        username: &str,
        password: &str,
    ) -> Result<Self::User, LoginError>;
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use log::warn;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct User {
        name: String,
        remote_addr: String,
    }

    #[derive(Default)]
    struct MemoryBackend {
        passwords: HashMap<String, String>,
        offline: bool,
        rejected: RefCell<Vec<String>>,
    }

    impl Backend for MemoryBackend {
        type User = User;

        fn login(
            &self,
            remote_addr: &str,
            username: &str,
            password: &str,
        ) -> Result<User, LoginError> {
            if self.offline {
                return Err(LoginError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "user database missing",
                )));
            }

            if Some(password) != self.passwords.get(username).map(|p| &**p) {
                warn!("{} Rejected login for user '{}'", remote_addr, username);
                self.rejected.borrow_mut().push(username.to_owned());
                return Err(LoginError::InvalidCredentials);
            }

            Ok(User {
                name: username.to_owned(),
                remote_addr: remote_addr.to_owned(),
            })
        }
    }

    fn backend() -> MemoryBackend {
        crate::init_test_log();
        let mut backend = MemoryBackend::default();
        backend.passwords.insert("taki".to_owned(), "hunter2".to_owned());
        backend
    }

    #[test]
    fn login_success() {
        assert_eq!(
            User {
                name: "taki".to_owned(),
                remote_addr: "192.0.2.1".to_owned(),
            },
            backend().login("192.0.2.1", "taki", "hunter2").unwrap()
        );
    }

    #[test]
    fn login_invalid() {
        let backend = backend();
        assert_matches!(
            Err(LoginError::InvalidCredentials),
            backend.login("192.0.2.1", "taki", "hunter3")
        );
        assert_matches!(
            Err(LoginError::InvalidCredentials),
            backend.login("192.0.2.1", "mitsuha", "hunter2")
        );
        assert_eq!(
            vec!["taki".to_owned(), "mitsuha".to_owned()],
            *backend.rejected.borrow()
        );
    }

    #[test]
    fn other_failures_are_distinct() {
        let backend = MemoryBackend {
            offline: true,
            ..backend()
        };
        let err = backend.login("192.0.2.1", "taki", "hunter2").unwrap_err();
        assert!(!err.is_invalid_credentials());
        assert_matches!(LoginError::Io(_), err);
        assert_eq!(
            "Invalid credentials",
            LoginError::InvalidCredentials.to_string()
        );
    }
}
