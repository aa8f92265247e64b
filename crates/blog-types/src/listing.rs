use serde::{Deserialize, Deserializer, de};

/// Posts shown per listing page.
pub const POSTS_PER_PAGE: i64 = 3;

/// Query string of `GET /` and `GET /posts`.
///
/// HTML filter forms submit empty fields (`?search=&tag=`), so every
/// numeric field treats an empty value as absent instead of rejecting it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub author: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tag: Option<i64>,
}

impl ListingQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Trimmed search term; blank input means "no search".
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Page window over a post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: i64,
    pub pages_count: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let pages_count = ((total.max(0) + per_page - 1) / per_page).max(1);
        Self {
            current: page.max(1),
            pages_count,
            per_page,
        }
    }

    /// Saturates for absurd `?page=` values; SQLite then returns no rows.
    pub fn offset(&self) -> i64 {
        (self.current - 1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.pages_count
    }

    /// 1-based page numbers for the pager links.
    pub fn pages(&self) -> std::ops::RangeInclusive<i64> {
        1..=self.pages_count
    }
}
