use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::ensure_parent;
use crate::domain::DeskError;

const AUTHENTICATED: &str = "true";

/// Login gate for the dashboard. The flag is read from disk once when the
/// session is loaded and written through on every change.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    authenticated: bool,
}

impl Session {
    pub fn load(path: PathBuf) -> Result<Self, DeskError> {
        let authenticated = match fs::read_to_string(&path) {
            Ok(content) => content.trim() == AUTHENTICATED,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        debug!(
            "Session loaded from {}, authenticated: {}",
            path.display(),
            authenticated
        );
        Ok(Session {
            path,
            authenticated,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Any non-blank email and password pair opens the session.
    pub fn login(&mut self, email: &str, password: &str) -> Result<bool, DeskError> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Ok(false);
        }
        ensure_parent(&self.path)?;
        fs::write(&self.path, AUTHENTICATED)?;
        self.authenticated = true;
        info!("Logged in as {}", email.trim());
        Ok(true)
    }

    pub fn logout(&mut self) -> Result<(), DeskError> {
        self.authenticated = false;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("Logged out");
        Ok(())
    }

    pub fn require(&self) -> Result<(), DeskError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(DeskError::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_persists_until_logout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("session");

        let mut session = Session::load(path.clone()).unwrap();
        assert!(!session.is_authenticated());
        assert!(matches!(session.require(), Err(DeskError::NotAuthenticated)));

        assert!(!session.login("", "secret").unwrap());
        assert!(!session.login("me@example.com", "  ").unwrap());
        assert!(session.login("me@example.com", "secret").unwrap());

        let reloaded = Session::load(path.clone()).unwrap();
        assert!(reloaded.is_authenticated());

        session.logout().unwrap();
        assert!(!session.is_authenticated());
        assert!(!Session::load(path).unwrap().is_authenticated());
    }

    #[test]
    fn logout_without_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::load(dir.path().join("missing")).unwrap();
        session.logout().unwrap();
    }
}
