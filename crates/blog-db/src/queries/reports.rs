use anyhow::Result;
use tracing::info;

use crate::Database;
use crate::models::ReportRow;

impl Database {
    // -- Reports --

    /// Stores a bug report. Anonymous reports carry no author.
    pub fn create_report(&self, author_id: Option<i64>, subject: &str, body: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO report (author_id, subject, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![author_id, subject, body],
            )?;
            let id = conn.last_insert_rowid();
            info!("Report {} filed: {}", id, subject);
            Ok(id)
        })
    }

    /// Newest reports first, for the admin panel.
    pub fn recent_reports(&self, limit: i64) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, u.name, r.subject, r.body, r.created_at
                 FROM report r LEFT JOIN user u ON u.id = r.author_id
                 ORDER BY r.id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |r| {
                    Ok(ReportRow {
                        id: r.get(0)?,
                        author_name: r.get(1)?,
                        subject: r.get(2)?,
                        body: r.get(3)?,
                        created_at: r.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
