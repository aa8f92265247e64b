use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

use super::placeholders;
use crate::Database;
use crate::models::TagRow;

impl Database {
    // -- Tags --

    /// Tags that label at least one post, alphabetically.
    pub fn all_tags(&self) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name FROM tag
                 WHERE id IN (SELECT tag_id FROM m2m_tag_post)
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(TagRow {
                        id: r.get(0)?,
                        name: r.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn tags_for_post(&self, post_id: i64) -> Result<Vec<TagRow>> {
        Ok(self
            .tags_for_posts(&[post_id])?
            .remove(&post_id)
            .unwrap_or_default())
    }

    /// Tags of several posts at once, for a listing page.
    pub fn tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<TagRow>>> {
        let mut by_post: HashMap<i64, Vec<TagRow>> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let sql = format!(
            "SELECT m.post_id, t.id, t.name FROM m2m_tag_post m
             JOIN tag t ON t.id = m.tag_id
             WHERE m.post_id IN ({})
             ORDER BY t.name",
            placeholders(post_ids.len())
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(post_ids.iter()))?;
            while let Some(row) = rows.next()? {
                by_post.entry(row.get(0)?).or_default().push(TagRow {
                    id: row.get(1)?,
                    name: row.get(2)?,
                });
            }
            Ok(())
        })?;

        Ok(by_post)
    }
}

/// Makes `names` the exact tag set of a post, creating missing tags.
pub(crate) fn replace_post_tags(conn: &Connection, post_id: i64, names: &[String]) -> Result<()> {
    conn.execute("DELETE FROM m2m_tag_post WHERE post_id = ?1", [post_id])?;

    let mut insert_tag = conn.prepare("INSERT OR IGNORE INTO tag (name) VALUES (?1)")?;
    let mut find_tag = conn.prepare("SELECT id FROM tag WHERE name = ?1")?;
    let mut link = conn.prepare("INSERT OR IGNORE INTO m2m_tag_post (tag_id, post_id) VALUES (?1, ?2)")?;

    for name in names {
        insert_tag.execute([name])?;
        let tag_id: i64 = find_tag.query_row([name], |r| r.get(0))?;
        link.execute([tag_id, post_id])?;
    }
    Ok(())
}
