use anyhow::Result;
use blog_types::url_key;
use rusqlite::{Connection, Row, types::Value};
use std::collections::HashSet;
use tracing::info;

use super::OptionalExt;
use super::attachments::{insert_attachment, unreferenced};
use super::tags::replace_post_tags;
use crate::Database;
use crate::models::{NewPost, PostFilter, PostRow};

const POST_COLUMNS: &str =
    "id, title, content, published_date, url_key, author_id, author_name, author_icon_name";

impl Database {
    // -- Posts --

    /// Inserts a post with its tags and optional attachment in one
    /// transaction. `url_key` is treated as a base and suffixed until unique.
    pub fn create_post(&self, post: &NewPost) -> Result<i64> {
        self.with_tx(|tx| {
            let taken = keys_with_prefix(tx, &post.url_key)?;
            let key = url_key::unique(&post.url_key, |k| taken.contains(k));

            tx.execute(
                "INSERT INTO post (title, content, author_id, url_key) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![post.title, post.content, post.author_id, key],
            )?;
            let post_id = tx.last_insert_rowid();

            replace_post_tags(tx, post_id, &post.tags)?;

            if let Some(name) = &post.attachment {
                let attachment_id = insert_attachment(tx, name)?;
                tx.execute(
                    "INSERT INTO post_attachment (attachment_id, post_id) VALUES (?1, ?2)",
                    [attachment_id, post_id],
                )?;
            }

            info!("Post {} created by user {} at /{}", post_id, post.author_id, key);
            Ok(post_id)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {POST_COLUMNS} FROM user_post_view WHERE id = ?1"),
                [id],
                post_from_row,
            )
            .optional()
        })
    }

    pub fn get_post_by_url_key(&self, key: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {POST_COLUMNS} FROM user_post_view WHERE url_key = ?1"),
                [key],
                post_from_row,
            )
            .optional()
        })
    }

    /// One page of the listing, newest first.
    pub fn list_posts(&self, filter: &PostFilter, limit: i64, offset: i64) -> Result<Vec<PostRow>> {
        let (clause, mut params) = filter_sql(filter);
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset.max(0)));

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM user_post_view WHERE {clause}
             ORDER BY published_date DESC, id DESC
             LIMIT ? OFFSET ?"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let (clause, params) = filter_sql(filter);
        let sql = format!("SELECT COUNT(*) FROM user_post_view WHERE {clause}");

        self.with_conn(|conn| {
            let total = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |r| r.get(0))?;
            Ok(total)
        })
    }

    pub fn posts_by_author(&self, author_id: i64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM user_post_view WHERE author_id = ?1
                 ORDER BY published_date DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([author_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Rewrites title and content and replaces the tag set.
    pub fn update_post(&self, id: i64, title: &str, content: &str, tags: &[String]) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE post SET title = ?1, content = ?2 WHERE id = ?3",
                rusqlite::params![title, content, id],
            )?;
            replace_post_tags(tx, id, tags)?;
            Ok(())
        })
    }

    /// Deletes a post together with its comments, their attachments, the
    /// post's own attachments and tag links, all in one transaction.
    /// Returns the public names of files no remaining row references.
    pub fn delete_post(&self, id: i64) -> Result<Vec<String>> {
        self.with_tx(|tx| {
            let files = {
                let mut stmt = tx.prepare(
                    "SELECT a.name FROM attachment a
                     JOIN comment_attachment ca ON ca.attachment_id = a.id
                     JOIN comment c ON c.id = ca.comment_id
                     WHERE c.post_id = ?1
                     UNION ALL
                     SELECT a.name FROM attachment a
                     JOIN post_attachment pa ON pa.attachment_id = a.id
                     WHERE pa.post_id = ?1",
                )?;
                stmt.query_map([id], |r| r.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.execute(
                "DELETE FROM attachment WHERE id IN (
                     SELECT ca.attachment_id FROM comment_attachment ca
                     JOIN comment c ON c.id = ca.comment_id
                     WHERE c.post_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM attachment WHERE id IN (
                     SELECT attachment_id FROM post_attachment WHERE post_id = ?1)",
                [id],
            )?;
            let comments = tx.execute("DELETE FROM comment WHERE post_id = ?1", [id])?;
            tx.execute("DELETE FROM m2m_tag_post WHERE post_id = ?1", [id])?;
            tx.execute("DELETE FROM post WHERE id = ?1", [id])?;

            info!("Post {} deleted with {} comment(s)", id, comments);
            unreferenced(tx, files)
        })
    }
}

/// Existing keys equal to `base` or starting with it.
fn keys_with_prefix(conn: &Connection, base: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT url_key FROM post WHERE url_key LIKE ?1 ESCAPE '\\'")?;
    let keys = stmt
        .query_map([format!("{}%", escape_like(base))], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(keys)
}

/// WHERE clause and its positional parameters for a listing filter.
fn filter_sql(filter: &PostFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["1=1"];
    let mut params = Vec::new();

    if let Some(author_id) = filter.author_id {
        clauses.push("author_id = ?");
        params.push(Value::Integer(author_id));
    }
    if let Some(search) = &filter.search {
        clauses.push("title LIKE ? ESCAPE '\\'");
        params.push(Value::Text(format!("%{}%", escape_like(search))));
    }
    if let Some(tag_id) = filter.tag_id {
        clauses.push("id IN (SELECT post_id FROM m2m_tag_post WHERE tag_id = ?)");
        params.push(Value::Integer(tag_id));
    }

    (clauses.join(" AND "), params)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        published_date: row.get(3)?,
        url_key: row.get(4)?,
        author_id: row.get(5)?,
        author_name: row.get(6)?,
        author_icon_name: row.get(7)?,
    })
}
