use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::info;

use super::OptionalExt;
use crate::Database;
use crate::models::{AttachmentRow, IconRow};

const ICON_COLUMNS: &str = "id, icon_name, is_default, user_id";

impl Database {
    // -- Attachments --

    pub fn post_attachments(&self, post_id: i64) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, attachment_name, post_id FROM post_attachment_view
                 WHERE post_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([post_id], attachment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Attachments of every comment under a post, keyed by comment id in
    /// `owner_id`.
    pub fn comment_attachments(&self, post_id: i64) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, attachment_name, comment_id FROM comment_attachment_view
                 WHERE post_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([post_id], attachment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Icons --

    /// The icon a user currently wears, if any.
    pub fn user_icon(&self, user_id: i64) -> Result<Option<IconRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {ICON_COLUMNS} FROM user_icon_view
                     WHERE id = (SELECT icon_id FROM user WHERE id = ?1)"
                ),
                [user_id],
                icon_from_row,
            )
            .optional()
        })
    }

    pub fn default_icons(&self) -> Result<Vec<IconRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ICON_COLUMNS} FROM user_icon_view WHERE is_default = 1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([], icon_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Registers an uploaded icon for the user and makes it current.
    pub fn add_user_icon(&self, user_id: i64, name: &str) -> Result<i64> {
        self.with_tx(|tx| {
            let attachment_id = insert_attachment(tx, name)?;
            tx.execute(
                "INSERT INTO user_icon (attachment_id, user_id, is_default) VALUES (?1, ?2, 0)",
                [attachment_id, user_id],
            )?;
            tx.execute("UPDATE user SET icon_id = ?1 WHERE id = ?2", [attachment_id, user_id])?;
            info!("User {} uploaded icon {}", user_id, attachment_id);
            Ok(attachment_id)
        })
    }

    pub fn is_default_icon(&self, icon_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<bool> = conn
                .query_row(
                    "SELECT is_default FROM user_icon WHERE attachment_id = ?1",
                    [icon_id],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(found.unwrap_or(false))
        })
    }
}

/// The subset of `names` no attachment row points at any more. Identical
/// uploads share one file on disk, so only these may be removed. Run it
/// inside the transaction that deleted the rows.
pub(crate) fn unreferenced(conn: &Connection, mut names: Vec<String>) -> Result<Vec<String>> {
    names.sort();
    names.dedup();

    let mut stmt = conn.prepare("SELECT COUNT(*) FROM attachment WHERE name = ?1")?;
    let mut free = Vec::with_capacity(names.len());
    for name in names {
        let count: i64 = stmt.query_row([&name], |r| r.get(0))?;
        if count == 0 {
            free.push(name);
        }
    }
    Ok(free)
}

pub(crate) fn insert_attachment(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT INTO attachment (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
    })
}

fn icon_from_row(row: &Row<'_>) -> rusqlite::Result<IconRow> {
    Ok(IconRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_default: row.get(2)?,
        user_id: row.get(3)?,
    })
}
