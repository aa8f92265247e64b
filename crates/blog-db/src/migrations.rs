use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Public path of the icon shown for users who never picked one.
pub const DEFAULT_AVATAR: &str = "/public/images/default_ico/default-avatar.png";

const DEFAULT_ICONS: &[&str] = &[
    DEFAULT_AVATAR,
    "/public/images/default_ico/cat.png",
    "/public/images/default_ico/dog.png",
    "/public/images/default_ico/owl.png",
    "/public/images/default_ico/fox.png",
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Blog DB: running migration v1 (initial schema)");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE role (
                id          INTEGER PRIMARY KEY,
                en_name     TEXT NOT NULL UNIQUE
            );

            INSERT INTO role (id, en_name) VALUES (1, 'Admin'), (2, 'User');

            CREATE TABLE attachment (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL
            );

            CREATE TABLE user (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name                TEXT NOT NULL UNIQUE,
                password_hash       TEXT NOT NULL,
                password_salt       TEXT NOT NULL,
                role_id             INTEGER NOT NULL DEFAULT 2 REFERENCES role(id),
                icon_id             INTEGER REFERENCES attachment(id) ON DELETE SET NULL,
                registration_date   TEXT NOT NULL DEFAULT (datetime('now')),
                last_visit_date     TEXT,
                moto                TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE post (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                author_id       INTEGER NOT NULL REFERENCES user(id),
                published_date  TEXT NOT NULL DEFAULT (datetime('now')),
                url_key         TEXT NOT NULL UNIQUE
            );

            CREATE INDEX idx_post_published ON post(published_date);
            CREATE INDEX idx_post_author ON post(author_id);

            CREATE TABLE comment (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                content         TEXT NOT NULL,
                post_id         INTEGER NOT NULL REFERENCES post(id),
                author_id       INTEGER NOT NULL REFERENCES user(id),
                published_date  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comment_post ON comment(post_id, published_date);

            CREATE TABLE post_attachment (
                attachment_id   INTEGER PRIMARY KEY REFERENCES attachment(id) ON DELETE CASCADE,
                post_id         INTEGER NOT NULL REFERENCES post(id)
            );

            CREATE TABLE comment_attachment (
                attachment_id   INTEGER PRIMARY KEY REFERENCES attachment(id) ON DELETE CASCADE,
                comment_id      INTEGER NOT NULL REFERENCES comment(id)
            );

            CREATE TABLE user_icon (
                attachment_id   INTEGER PRIMARY KEY REFERENCES attachment(id) ON DELETE CASCADE,
                user_id         INTEGER REFERENCES user(id),
                is_default      INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE tag (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE m2m_tag_post (
                tag_id  INTEGER NOT NULL REFERENCES tag(id),
                post_id INTEGER NOT NULL REFERENCES post(id),
                PRIMARY KEY (tag_id, post_id)
            );

            CREATE TABLE report (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id   INTEGER REFERENCES user(id),
                subject     TEXT NOT NULL,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE VIEW user_icon_view AS
                SELECT a.id AS id, a.name AS icon_name, ui.is_default AS is_default, ui.user_id AS user_id
                FROM user_icon ui
                JOIN attachment a ON a.id = ui.attachment_id;

            CREATE VIEW user_post_view AS
                SELECT p.id, p.title, p.content, p.published_date, p.url_key, p.author_id,
                       u.name AS author_name, a.name AS author_icon_name
                FROM post p
                JOIN user u ON u.id = p.author_id
                LEFT JOIN attachment a ON a.id = u.icon_id;

            CREATE VIEW user_comment_view AS
                SELECT c.id, c.content, c.published_date, c.post_id, c.author_id,
                       u.name AS author_name, a.name AS author_icon_name
                FROM comment c
                JOIN user u ON u.id = c.author_id
                LEFT JOIN attachment a ON a.id = u.icon_id;

            CREATE VIEW post_attachment_view AS
                SELECT a.id, a.name AS attachment_name, pa.post_id
                FROM post_attachment pa
                JOIN attachment a ON a.id = pa.attachment_id;

            CREATE VIEW comment_attachment_view AS
                SELECT a.id, a.name AS attachment_name, ca.comment_id, c.post_id
                FROM comment_attachment ca
                JOIN attachment a ON a.id = ca.attachment_id
                JOIN comment c ON c.id = ca.comment_id;

            CREATE VIEW user_info_view AS
                SELECT u.id AS user_id, u.name, u.role_id, r.en_name AS role_name,
                       u.registration_date, u.last_visit_date, u.moto,
                       (SELECT COUNT(*) FROM post p WHERE p.author_id = u.id) AS total,
                       (SELECT COUNT(*) FROM comment c WHERE c.author_id = u.id) AS comment_total
                FROM user u
                JOIN role r ON r.id = u.role_id;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        seed_default_icons(&tx)?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn seed_default_icons(conn: &Connection) -> Result<()> {
    let mut insert_attachment = conn.prepare("INSERT INTO attachment (name) VALUES (?1)")?;
    let mut insert_icon =
        conn.prepare("INSERT INTO user_icon (attachment_id, user_id, is_default) VALUES (?1, NULL, 1)")?;

    for name in DEFAULT_ICONS {
        insert_attachment.execute([name])?;
        insert_icon.execute([conn.last_insert_rowid()])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let roles: i64 = conn.query_row("SELECT COUNT(*) FROM role", [], |r| r.get(0)).unwrap();
        assert_eq!(roles, 2);

        let icons: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_icon_view WHERE is_default = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(icons, DEFAULT_ICONS.len() as i64);
    }
}
