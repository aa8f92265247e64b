use std::path::{Component, PathBuf};
use std::{env, fmt::Display, str::FromStr};

use anyhow::{Result, anyhow, bail};
use tracing::info;

pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
    pub session_hours: i64,
    pub secure_cookies: bool,
    /// User names promoted to Admin at startup.
    pub admins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: try_load(&lookup, "BLOG_DATABASE_URL", "sqlite://blog.db")?,
            host: try_load(&lookup, "BLOG_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "BLOG_PORT", "3000")?,
            upload_dir: try_load(&lookup, "BLOG_UPLOAD_DIR", "public/images")?,
            public_dir: try_load(&lookup, "BLOG_PUBLIC_DIR", "public")?,
            session_hours: try_load(&lookup, "BLOG_SESSION_HOURS", "24")?,
            secure_cookies: try_load(&lookup, "BLOG_SECURE_COOKIES", "false")?,
            admins: lookup("BLOG_ADMINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        if config.session_hours <= 0 {
            bail!("BLOG_SESSION_HOURS must be positive");
        }
        config.upload_url()?;
        Ok(config)
    }

    /// URL prefix under which uploads are served. The upload directory
    /// has to live inside the public directory.
    pub fn upload_url(&self) -> Result<String> {
        let relative = self.upload_dir.strip_prefix(&self.public_dir).map_err(|_| {
            anyhow!(
                "BLOG_UPLOAD_DIR ({}) must be inside BLOG_PUBLIC_DIR ({})",
                self.upload_dir.display(),
                self.public_dir.display()
            )
        })?;

        let mut url = String::from("/public");
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    url.push('/');
                    url.push_str(&part.to_string_lossy());
                }
                Component::CurDir => {}
                _ => bail!("BLOG_UPLOAD_DIR must not leave BLOG_PUBLIC_DIR"),
            }
        }
        Ok(url)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}
