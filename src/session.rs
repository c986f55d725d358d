use thiserror::Error;

use crate::models::{AuthSession, LoginRequest, PasswordChange, RegisterRequest, User};
use crate::store::{Store, StoreError, LEGACY_TOKEN_KEY, TOKEN_KEY, USER_KEY};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, PartialEq)]
pub enum CredentialsError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Passwords do not match!")]
    PasswordMismatch,
}

fn required(value: &str, field: &'static str) -> Result<String, CredentialsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CredentialsError::MissingField(field));
    }
    Ok(value.to_string())
}

fn email(value: &str) -> Result<String, CredentialsError> {
    let value = required(value, "Email")?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value),
        _ => Err(CredentialsError::InvalidEmail(value)),
    }
}

fn new_password(password: &str, confirmation: &str) -> Result<String, CredentialsError> {
    if password.is_empty() {
        return Err(CredentialsError::MissingField("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredentialsError::PasswordTooShort);
    }
    if password != confirmation {
        return Err(CredentialsError::PasswordMismatch);
    }
    Ok(password.to_string())
}

/// Login form: both fields required. Passwords are never trimmed.
pub fn login_request(email_input: &str, password: &str) -> Result<LoginRequest, CredentialsError> {
    let email = required(email_input, "Email")?;
    if password.is_empty() {
        return Err(CredentialsError::MissingField("Password"));
    }
    Ok(LoginRequest {
        email,
        password: password.to_string(),
    })
}

pub fn register_request(
    name: &str,
    email_input: &str,
    password: &str,
    confirmation: &str,
) -> Result<RegisterRequest, CredentialsError> {
    Ok(RegisterRequest {
        name: required(name, "Name")?,
        email: email(email_input)?,
        password: new_password(password, confirmation)?,
    })
}

pub fn password_change(current: &str, new: &str, confirmation: &str) -> Result<PasswordChange, CredentialsError> {
    if current.is_empty() {
        return Err(CredentialsError::MissingField("Current password"));
    }
    Ok(PasswordChange {
        current_password: current.to_string(),
        new_password: new_password(new, confirmation)?,
    })
}

/// The signed-in user, loaded from the store on startup,
/// replaced on login and cleared on logout or account deletion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
}

impl Session {
    /// Restore the session persisted by a previous run
    pub fn load(store: &Store) -> Result<Self, StoreError> {
        let token = match store.get(TOKEN_KEY)? {
            Some(token) => Some(token),
            None => store.get(LEGACY_TOKEN_KEY)?,
        }
        .filter(|t| !t.trim().is_empty());

        let user = match store.get_json::<User>(USER_KEY) {
            Ok(user) => user,
            Err(StoreError::JsonError { .. }) => {
                tracing::warn!("Stored user is unreadable; treating session as signed out");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self { token, user })
    }

    /// Persist a successful login or registration
    pub fn begin(&mut self, store: &Store, auth: AuthSession) -> Result<(), StoreError> {
        store.set(TOKEN_KEY, &auth.token)?;
        store.remove(LEGACY_TOKEN_KEY)?;
        store.set_json(USER_KEY, &auth.user)?;
        tracing::info!(email = %auth.user.email, "Signed in");
        self.token = Some(auth.token);
        self.user = Some(auth.user);
        Ok(())
    }

    /// Replace the cached user after a profile fetch or update
    pub fn update_user(&mut self, store: &Store, user: User) -> Result<(), StoreError> {
        store.set_json(USER_KEY, &user)?;
        self.user = Some(user);
        Ok(())
    }

    pub fn clear(&mut self, store: &Store) -> Result<(), StoreError> {
        store.remove(TOKEN_KEY)?;
        store.remove(LEGACY_TOKEN_KEY)?;
        store.remove(USER_KEY)?;
        self.token = None;
        self.user = None;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Both a token and a user are required
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> AuthSession {
        AuthSession {
            token: "jwt-token".to_string(),
            user: User {
                id: Some("1".to_string()),
                name: "Ada".to_string(),
                email: "ada@example.org".to_string(),
                weekly_goal_kg: None,
            },
        }
    }

    #[test]
    fn test_login_request_requires_both_fields() {
        assert_eq!(login_request(" ", "pw").unwrap_err(), CredentialsError::MissingField("Email"));
        assert_eq!(login_request("a@b.c", "").unwrap_err(), CredentialsError::MissingField("Password"));
        let request = login_request(" a@b.c ", " pw ").unwrap();
        assert_eq!(request.email, "a@b.c");
        assert_eq!(request.password, " pw ");
    }

    #[test]
    fn test_register_request_checks_password() {
        assert_eq!(
            register_request("Ada", "ada@example.org", "abc", "abc").unwrap_err(),
            CredentialsError::PasswordTooShort
        );
        assert_eq!(
            register_request("Ada", "ada@example.org", "abcdef", "abcdeg").unwrap_err(),
            CredentialsError::PasswordMismatch
        );
        assert_eq!(
            register_request("Ada", "ada.example.org", "abcdef", "abcdef").unwrap_err(),
            CredentialsError::InvalidEmail("ada.example.org".to_string())
        );
        assert_eq!(
            register_request("", "ada@example.org", "abcdef", "abcdef").unwrap_err(),
            CredentialsError::MissingField("Name")
        );
        assert!(register_request("Ada", "ada@example.org", "abcdef", "abcdef").is_ok());
    }

    #[test]
    fn test_password_change() {
        assert_eq!(
            password_change("", "abcdef", "abcdef").unwrap_err(),
            CredentialsError::MissingField("Current password")
        );
        let change = password_change("old", "newpass", "newpass").unwrap();
        assert_eq!(change.new_password, "newpass");
    }

    #[test]
    fn test_begin_persists_and_clear_removes() {
        let store = Store::in_memory().unwrap();
        let mut session = Session::load(&store).unwrap();
        assert!(!session.is_authenticated());

        session.begin(&store, auth()).unwrap();
        let restored = Session::load(&store).unwrap();
        assert!(restored.is_authenticated());
        assert_eq!(restored.token(), Some("jwt-token"));
        assert_eq!(restored.user().unwrap().name, "Ada");

        session.clear(&store).unwrap();
        assert!(!Session::load(&store).unwrap().is_authenticated());
    }

    #[test]
    fn test_legacy_token_key_is_read() {
        let store = Store::in_memory().unwrap();
        store.set(LEGACY_TOKEN_KEY, "old-token").unwrap();
        store.set_json(USER_KEY, &auth().user).unwrap();
        let session = Session::load(&store).unwrap();
        assert_eq!(session.token(), Some("old-token"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_token_without_user_is_not_authenticated() {
        let store = Store::in_memory().unwrap();
        store.set(TOKEN_KEY, "jwt").unwrap();
        store.set(USER_KEY, "{broken").unwrap();
        let session = Session::load(&store).unwrap();
        assert!(!session.is_authenticated());
    }
}
