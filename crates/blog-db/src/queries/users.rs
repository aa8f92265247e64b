use anyhow::Result;
use blog_types::Role;
use rusqlite::{Connection, ErrorCode, Row, types::ToSql};
use tracing::info;

use super::OptionalExt;
use crate::Database;
use crate::models::{UserInfoRow, UserRow};

const USER_COLUMNS: &str = "id, name, password_hash, password_salt, role_id, icon_id, \
     registration_date, last_visit_date, moto";

const INFO_COLUMNS: &str = "user_id, name, role_id, role_name, registration_date, \
     last_visit_date, moto, total, comment_total";

/// Fields of a profile edit; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    /// Argon2 PHC hash and the salt it was made with.
    pub password: Option<(&'a str, &'a str)>,
    pub moto: Option<&'a str>,
}

impl ProfileUpdate<'_> {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password.is_none() && self.moto.is_none()
    }
}

impl Database {
    // -- Users --

    /// Returns `None` when the name is already taken.
    pub fn create_user(
        &self,
        name: &str,
        password_hash: &str,
        password_salt: &str,
        role: Role,
    ) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO user (name, password_hash, password_salt, role_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, password_hash, password_salt, role.id()],
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "name = ?1", &name))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn touch_last_visit(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE user SET last_visit_date = datetime('now') WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Applies a profile edit. Returns `false` when the new name belongs
    /// to somebody else; nothing is written in that case.
    pub fn update_profile(&self, id: i64, update: &ProfileUpdate<'_>) -> Result<bool> {
        if update.is_empty() {
            return Ok(true);
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?");
            params.push(name);
        }
        if let Some((hash, salt)) = &update.password {
            sets.push("password_hash = ?");
            params.push(hash);
            sets.push("password_salt = ?");
            params.push(salt);
        }
        if let Some(moto) = &update.moto {
            sets.push("moto = ?");
            params.push(moto);
        }
        params.push(&id);

        let sql = format!("UPDATE user SET {} WHERE id = ?", sets.join(", "));

        self.with_conn(|conn| match conn.execute(&sql, params.as_slice()) {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        })
    }

    pub fn set_user_icon(&self, user_id: i64, icon_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE user SET icon_id = ?1 WHERE id = ?2", [icon_id, user_id])?;
            Ok(())
        })
    }

    pub fn get_user_info(&self, user_id: i64) -> Result<Option<UserInfoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {INFO_COLUMNS} FROM user_info_view WHERE user_id = ?1"),
                [user_id],
                info_from_row,
            )
            .optional()
        })
    }

    /// Users ordered by karma, best first.
    pub fn karma_leaders(&self, limit: i64) -> Result<Vec<UserInfoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INFO_COLUMNS} FROM user_info_view ORDER BY total DESC, name ASC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], info_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Grants the admin role to every listed, existing user.
    pub fn promote_admins(&self, names: &[String]) -> Result<usize> {
        let mut promoted = 0;
        self.with_tx(|tx| {
            let mut stmt = tx.prepare("UPDATE user SET role_id = ?1 WHERE name = ?2")?;
            for name in names {
                promoted += stmt.execute(rusqlite::params![Role::Admin.id(), name])?;
            }
            Ok(())
        })?;
        if promoted > 0 {
            info!("Promoted {} user(s) to admin", promoted);
        }
        Ok(promoted)
    }
}

fn query_user(conn: &Connection, predicate: &str, param: &dyn ToSql) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE {predicate}"))?;
    stmt.query_row([param], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
        password_salt: row.get(3)?,
        role_id: row.get(4)?,
        icon_id: row.get(5)?,
        registration_date: row.get(6)?,
        last_visit_date: row.get(7)?,
        moto: row.get(8)?,
    })
}

fn info_from_row(row: &Row<'_>) -> rusqlite::Result<UserInfoRow> {
    Ok(UserInfoRow {
        user_id: row.get(0)?,
        name: row.get(1)?,
        role_id: row.get(2)?,
        role_name: row.get(3)?,
        registration_date: row.get(4)?,
        last_visit_date: row.get(5)?,
        moto: row.get(6)?,
        total: row.get(7)?,
        comment_total: row.get(8)?,
    })
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn duplicate_name_is_reported_not_raised() {
        let db = fixtures::db();
        assert!(db.create_user("nikita", "h", "s", Role::User).unwrap().is_some());
        assert!(db.create_user("nikita", "h2", "s2", Role::User).unwrap().is_none());
    }

    #[test]
    fn lookup_by_name_and_id() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "anna");

        let by_name = db.get_user_by_name("anna").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.role_id, Role::User.id());
        assert!(by_name.last_visit_date.is_none());
        assert_eq!(by_name.moto, "");

        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().name, "anna");
        assert!(db.get_user_by_name("nobody").unwrap().is_none());
    }

    #[test]
    fn last_visit_is_recorded() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "anna");
        db.touch_last_visit(id).unwrap();
        assert!(db.get_user_by_id(id).unwrap().unwrap().last_visit_date.is_some());
    }

    #[test]
    fn profile_update_touches_only_given_fields() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "anna");

        let update = ProfileUpdate {
            moto: Some("carpe diem"),
            ..Default::default()
        };
        assert!(db.update_profile(id, &update).unwrap());

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.moto, "carpe diem");
        assert_eq!(user.name, "anna");
        assert_eq!(user.password_hash, "hash");

        let update = ProfileUpdate {
            name: Some("anna_k"),
            password: Some(("newhash", "newsalt")),
            ..Default::default()
        };
        assert!(db.update_profile(id, &update).unwrap());
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.name, "anna_k");
        assert_eq!(user.password_hash, "newhash");
        assert_eq!(user.password_salt, "newsalt");
        assert_eq!(user.moto, "carpe diem");
    }

    #[test]
    fn renaming_onto_a_taken_name_fails_cleanly() {
        let db = fixtures::db();
        let anna = fixtures::user(&db, "anna");
        fixtures::user(&db, "boris");

        let update = ProfileUpdate {
            name: Some("boris"),
            moto: Some("ignored"),
            ..Default::default()
        };
        assert!(!db.update_profile(anna, &update).unwrap());
        let user = db.get_user_by_id(anna).unwrap().unwrap();
        assert_eq!(user.name, "anna");
        assert_eq!(user.moto, "");
    }

    #[test]
    fn karma_orders_by_post_count() {
        let db = fixtures::db();
        let anna = fixtures::user(&db, "anna");
        let boris = fixtures::user(&db, "boris");
        fixtures::user(&db, "vera");

        fixtures::post(&db, boris, "one");
        fixtures::post(&db, boris, "two");
        fixtures::post(&db, anna, "three");

        let leaders = db.karma_leaders(10).unwrap();
        let names: Vec<_> = leaders.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["boris", "anna", "vera"]);
        assert_eq!(leaders[0].total, 2);
        assert_eq!(leaders[2].total, 0);

        assert_eq!(db.karma_leaders(1).unwrap().len(), 1);
    }

    #[test]
    fn user_info_carries_role_and_totals() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "anna");
        let post = fixtures::post(&db, id, "hello");
        db.create_comment(post, id, "first", None).unwrap();

        let info = db.get_user_info(id).unwrap().unwrap();
        assert_eq!(info.role_name, "User");
        assert_eq!(info.total, 1);
        assert_eq!(info.comment_total, 1);
    }

    #[test]
    fn admins_are_promoted_by_name() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "root");
        let promoted = db
            .promote_admins(&["root".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(promoted, 1);
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().role_id, Role::Admin.id());
    }
}
