use anyhow::Result;
use rusqlite::Row;
use tracing::info;

use super::OptionalExt;
use super::attachments::{insert_attachment, unreferenced};
use crate::Database;
use crate::models::CommentRow;

const COMMENT_COLUMNS: &str =
    "id, content, published_date, post_id, author_id, author_name, author_icon_name";

impl Database {
    // -- Comments --

    pub fn create_comment(
        &self,
        post_id: i64,
        author_id: i64,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<i64> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO comment (content, post_id, author_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![content, post_id, author_id],
            )?;
            let comment_id = tx.last_insert_rowid();

            if let Some(name) = attachment {
                let attachment_id = insert_attachment(tx, name)?;
                tx.execute(
                    "INSERT INTO comment_attachment (attachment_id, comment_id) VALUES (?1, ?2)",
                    [attachment_id, comment_id],
                )?;
            }
            Ok(comment_id)
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM user_comment_view WHERE id = ?1"),
                [id],
                comment_from_row,
            )
            .optional()
        })
    }

    /// Comments of a post in the order they were written.
    pub fn comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM user_comment_view WHERE post_id = ?1
                 ORDER BY published_date ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(&self, id: i64, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comment SET content = ?1 WHERE id = ?2",
                rusqlite::params![content, id],
            )?;
            Ok(())
        })
    }

    /// Deletes a comment and its attachments. Returns the public names of
    /// files no remaining row references.
    pub fn delete_comment(&self, id: i64) -> Result<Vec<String>> {
        self.with_tx(|tx| {
            let files = {
                let mut stmt = tx.prepare(
                    "SELECT attachment_name FROM comment_attachment_view WHERE comment_id = ?1",
                )?;
                stmt.query_map([id], |r| r.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.execute(
                "DELETE FROM attachment WHERE id IN (
                     SELECT attachment_id FROM comment_attachment WHERE comment_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM comment WHERE id = ?1", [id])?;

            info!("Comment {} deleted", id);
            unreferenced(tx, files)
        })
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        published_date: row.get(2)?,
        post_id: row.get(3)?,
        author_id: row.get(4)?,
        author_name: row.get(5)?,
        author_icon_name: row.get(6)?,
    })
}
