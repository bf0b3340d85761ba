use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub img_url: Option<String>,
}

/// One movie tracked by one user. `(user_id, imdb_id)` is the entry's
/// identity; title, year, actors and poster are snapshots of the catalog at
/// add time and never change afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub imdb_id: String,
    pub user_id: u64,
    pub title: String,
    pub year: String,
    pub actors: Option<String>,
    pub platform: Option<Platform>,
    pub imdb_img: String,
    pub favorite: bool,
    pub date_viewed: Option<NaiveDate>,
    pub date_added: NaiveDate,
}

/// The closed set of viewing platforms offered by the add/update form.
/// Anything else, including "n/a" and the empty string, means "unset".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    #[serde(rename = "netflix")]
    Netflix,
    #[serde(rename = "amazon prime")]
    AmazonPrime,
    #[serde(rename = "hbo max")]
    HboMax,
    #[serde(rename = "hulu")]
    Hulu,
    #[serde(rename = "apple tv")]
    AppleTv,
}

impl Platform {
    pub fn parse(value: &str) -> Option<Platform> {
        match value.to_ascii_lowercase().as_str() {
            "netflix" => Some(Platform::Netflix),
            "amazon prime" => Some(Platform::AmazonPrime),
            "hbo max" => Some(Platform::HboMax),
            "hulu" => Some(Platform::Hulu),
            "apple tv" => Some(Platform::AppleTv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Netflix => "netflix",
            Platform::AmazonPrime => "amazon prime",
            Platform::HboMax => "hbo max",
            Platform::Hulu => "hulu",
            Platform::AppleTv => "apple tv",
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Year,
    DateAdded,
    DateViewed,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<SortKey> {
        match value {
            "title" => Some(SortKey::Title),
            "year" => Some(SortKey::Year),
            "date_added" => Some(SortKey::DateAdded),
            "date_viewed" => Some(SortKey::DateViewed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Year => "year",
            SortKey::DateAdded => "date_added",
            SortKey::DateViewed => "date_viewed",
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<SortOrder> {
        match value {
            "asc" => Some(SortOrder::Ascending),
            "desc" => Some(SortOrder::Descending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Validated filter/sort selection for a ledger listing. Built from raw
/// query-string values with `parse`; values outside the recognized sets are
/// ignored rather than rejected, and an order without a sort key has no
/// effect.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerQuery {
    pub favorites_only: bool,
    pub sort: Option<(SortKey, SortOrder)>,
}

impl LedgerQuery {
    pub fn parse(filter: Option<&str>, sort: Option<&str>, order: Option<&str>) -> LedgerQuery {
        let favorites_only = filter == Some("favorites");
        let sort = sort.and_then(SortKey::parse).map(|key| {
            let order = order
                .and_then(SortOrder::parse)
                .unwrap_or(SortOrder::Ascending);
            (key, order)
        });
        LedgerQuery {
            favorites_only,
            sort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse() {
        assert_eq!(Platform::parse("netflix"), Some(Platform::Netflix));
        assert_eq!(Platform::parse("Amazon Prime"), Some(Platform::AmazonPrime));
        assert_eq!(Platform::parse("n/a"), None);
        assert_eq!(Platform::parse(""), None);
        assert_eq!(Platform::parse("betamax"), None);
        assert_eq!(Platform::parse(Platform::HboMax.as_str()), Some(Platform::HboMax));
    }

    #[test]
    fn query_parse_recognized() {
        let query = LedgerQuery::parse(Some("favorites"), Some("title"), Some("desc"));
        assert!(query.favorites_only);
        assert_eq!(query.sort, Some((SortKey::Title, SortOrder::Descending)));
    }

    #[test]
    fn query_parse_defaults_to_ascending() {
        let query = LedgerQuery::parse(None, Some("year"), None);
        assert_eq!(query.sort, Some((SortKey::Year, SortOrder::Ascending)));
    }

    #[test]
    fn query_parse_ignores_unrecognized_values() {
        let query = LedgerQuery::parse(Some("unwatched"), Some("rating"), Some("sideways"));
        assert!(!query.favorites_only);
        assert_eq!(query.sort, None);
    }

    #[test]
    fn query_parse_order_without_sort_key() {
        let query = LedgerQuery::parse(None, None, Some("desc"));
        assert_eq!(query.sort, None);
    }
}
