use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The persisted credential pair.
///
/// Both values are opaque bearer strings issued by the identity service: the
/// access credential is short-lived and attached to API calls; the renewal
/// credential is longer-lived and used solely to obtain a fresh access
/// credential.
///
/// # Security
///
/// Credential values are never logged. The `Debug` implementation redacts
/// both fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer value attached to API calls
    pub access: String,
    /// Longer-lived value used to renew the access credential
    pub renewal: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, renewal: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            renewal: renewal.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"[REDACTED]")
            .field("renewal", &"[REDACTED]")
            .finish()
    }
}

/// Role tag on a user profile.
///
/// Unknown roles returned by the service deserialize as `Customer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    Customer,
}

/// Optional nested profile attributes on a user profile.
///
/// All fields are optional; the service omits whatever the user has not
/// filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAttributes {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f32>,
    #[serde(default)]
    pub weight_kg: Option<f32>,
    #[serde(default)]
    pub fitness_goal: Option<String>,
}

/// Read-only snapshot of the authenticated user.
///
/// Obtained from the identity service after any successful authentication
/// event; replaced wholesale on every (re)authentication, never partially
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub profile: Option<ProfileAttributes>,
}

/// Details for creating a new account.
///
/// Registration creates the account but does not authenticate.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub identifier: String,
    pub secret: String,
    pub handle: String,
    pub display_name: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("handle", &self.handle)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Reactive session state consumed by the rest of the application.
///
/// Exactly one value is current at any time. The session manager is the
/// single writer (the request pipeline writes through the shared hub for
/// forced logout); any component may hold a reader.
///
/// # State Transitions
///
/// ```text
/// Unauthenticated -> Verifying -> Authenticated(user)
///       ^               |
///       |               v
///       +----------- Error(reason)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "detail")]
pub enum SessionState {
    /// No session; the user must log in.
    #[default]
    Unauthenticated,
    /// A login or startup verification is in flight.
    Verifying,
    /// The user is authenticated; carries the current profile snapshot.
    Authenticated(User),
    /// A login or verification attempt failed; carries the reason for display.
    Error(String),
}

impl SessionState {
    /// Whether a user is currently authenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "Signed Out"),
            SessionState::Verifying => write!(f, "Verifying..."),
            SessionState::Authenticated(user) => write!(f, "Signed In ({})", user.handle),
            SessionState::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            handle: "casey".to_string(),
            email: "casey@example.com".to_string(),
            display_name: "Casey".to_string(),
            role: Role::Customer,
            profile: None,
        }
    }

    #[test]
    fn test_credential_pair_debug_redacts() {
        let pair = CredentialPair::new("secret_access", "secret_renewal");
        let debug_str = format!("{:?}", pair);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_access"));
        assert!(!debug_str.contains("secret_renewal"));
    }

    #[test]
    fn test_new_account_debug_redacts_secret() {
        let account = NewAccount {
            identifier: "casey@example.com".to_string(),
            secret: "hunter2".to_string(),
            handle: "casey".to_string(),
            display_name: "Casey".to_string(),
        };
        let debug_str = format!("{:?}", account);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_session_state_helpers() {
        assert!(!SessionState::Unauthenticated.is_authenticated());
        assert!(!SessionState::Verifying.is_authenticated());
        assert!(!SessionState::Error("nope".to_string()).is_authenticated());

        let state = SessionState::Authenticated(sample_user());
        assert!(state.is_authenticated());
        assert_eq!(state.user().unwrap().handle, "casey");
    }

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_user_deserializes_camel_case() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "handle": "casey",
            "email": "casey@example.com",
            "displayName": "Casey",
            "role": "admin",
            "profile": {"heightCm": 180.0, "fitnessGoal": "endurance"}
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.display_name, "Casey");
        assert_eq!(user.role, Role::Admin);
        let profile = user.profile.unwrap();
        assert_eq!(profile.height_cm, Some(180.0));
        assert_eq!(profile.fitness_goal.as_deref(), Some("endurance"));
        assert!(profile.phone.is_none());
    }

    #[test]
    fn test_unknown_role_maps_to_customer() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "handle": "casey",
            "email": "casey@example.com",
            "displayName": "Casey",
            "role": "superuser"
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Customer);
    }

    #[test]
    fn test_missing_role_defaults_to_customer() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "handle": "casey",
            "email": "casey@example.com",
            "displayName": "Casey"
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(user.profile.is_none());
    }
}
