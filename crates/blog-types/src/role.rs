/// User roles as stored in the `role` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const fn id(self) -> i64 {
        match self {
            Role::Admin => 1,
            Role::User => 2,
        }
    }

    /// Unknown ids degrade to `User` so a bad row never grants admin rights.
    pub fn from_id(id: i64) -> Self {
        match id {
            1 => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}
