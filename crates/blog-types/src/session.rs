use serde::{Deserialize, Serialize};

/// Key under which the authenticated user is kept in the session.
pub const SESSION_USER_KEY: &str = "user";

/// The only per-user state carried between requests.
/// Everything else is read from the database on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
}
