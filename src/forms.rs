//! Form and query-string payloads, validated and normalized at the request
//! edge. Optional inputs arrive from the browser as empty strings; they are
//! converted to absent values here so the stores never see an empty-string
//! sentinel.

use crate::model::Platform;
use chrono::NaiveDate;
use serde::Deserialize;

fn none_if_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, &'static str> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| "dates must look like 2023-01-31")
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub img_url: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err("all fields are required");
        }
        if !self.email.contains('@') {
            return Err("a valid e-mail address is required");
        }
        if self.password.len() < 6 {
            return Err("passwords need at least 6 characters");
        }
        Ok(())
    }

    pub fn img_url(&self) -> Option<String> {
        none_if_empty(&self.img_url)
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfileEditForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub new_password: String,
    pub password: String,
}

impl ProfileEditForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err("all fields are required");
        }
        if !self.email.contains('@') {
            return Err("a valid e-mail address is required");
        }
        if !self.new_password.is_empty() && self.new_password.len() < 6 {
            return Err("passwords need at least 6 characters");
        }
        Ok(())
    }

    pub fn img_url(&self) -> Option<String> {
        none_if_empty(&self.img_url)
    }

    pub fn new_password(&self) -> Option<&str> {
        if self.new_password.is_empty() {
            None
        } else {
            Some(&self.new_password)
        }
    }
}

#[derive(Deserialize)]
pub struct ProfileDeleteForm {
    pub password: String,
}

/// The add/update form on the movie detail page. Title, year, actors and
/// poster travel as hidden fields populated from the catalog; only
/// favorite, platform and date viewed are user-editable.
#[derive(Deserialize)]
pub struct MovieForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub actors: String,
    #[serde(default)]
    pub imdb_img: String,
    // Checkboxes are simply absent when unchecked.
    #[serde(default)]
    pub favorite: Option<String>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub date_viewed: String,
}

impl MovieForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.is_empty() || self.year.is_empty() {
            return Err("title and year are required");
        }
        Ok(())
    }

    pub fn favorite(&self) -> bool {
        self.favorite.is_some()
    }

    pub fn platform(&self) -> Option<Platform> {
        Platform::parse(&self.platform)
    }

    pub fn date_viewed(&self) -> Result<Option<NaiveDate>, &'static str> {
        parse_optional_date(&self.date_viewed)
    }

    pub fn actors(&self) -> Option<String> {
        none_if_empty(&self.actors)
    }

    /// OMDb years sometimes span a range ("2008–2013"); the ledger keeps
    /// the first four characters only.
    pub fn year(&self) -> String {
        self.year.chars().take(4).collect()
    }
}

/// JSON body of the quick-add call made from the search results page.
#[derive(Deserialize)]
pub struct QuickAddPayload {
    pub title: String,
    pub year: String,
    pub imdb_img: String,
}

#[derive(Deserialize)]
pub struct MoviesQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    #[serde(default)]
    pub notice: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub term: Option<String>,
    pub page: Option<u32>,
    #[serde(default)]
    pub notice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_form() -> MovieForm {
        MovieForm {
            title: "Pulp Fiction".to_owned(),
            year: "1994–1995".to_owned(),
            actors: String::new(),
            imdb_img: "http://img.example.com/poster.jpg".to_owned(),
            favorite: None,
            platform: "n/a".to_owned(),
            date_viewed: String::new(),
        }
    }

    #[test]
    fn signup_validation() {
        let mut form = SignupForm {
            username: "alice".to_owned(),
            email: "alice@test.com".to_owned(),
            password: "secret1".to_owned(),
            img_url: String::new(),
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.img_url(), None);

        form.password = "short".to_owned();
        assert!(form.validate().is_err());
        form.password = "secret1".to_owned();
        form.email = "not-an-address".to_owned();
        assert!(form.validate().is_err());
        form.email = String::new();
        assert!(form.validate().is_err());
    }

    #[test]
    fn profile_edit_new_password_is_optional() {
        let mut form = ProfileEditForm {
            username: "alice".to_owned(),
            email: "alice@test.com".to_owned(),
            img_url: String::new(),
            new_password: String::new(),
            password: "secret1".to_owned(),
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.new_password(), None);

        form.new_password = "tiny".to_owned();
        assert!(form.validate().is_err());
        form.new_password = "longenough".to_owned();
        assert!(form.validate().is_ok());
        assert_eq!(form.new_password(), Some("longenough"));
    }

    #[test]
    fn movie_form_normalizes_optional_fields() {
        let form = movie_form();
        assert!(form.validate().is_ok());
        assert!(!form.favorite());
        assert_eq!(form.platform(), None);
        assert_eq!(form.date_viewed().unwrap(), None);
        assert_eq!(form.actors(), None);
        assert_eq!(form.year(), "1994");
    }

    #[test]
    fn movie_form_parses_present_fields() {
        let mut form = movie_form();
        form.favorite = Some("on".to_owned());
        form.platform = "hbo max".to_owned();
        form.date_viewed = "2023-02-01".to_owned();
        form.actors = "John Travolta, Samuel L. Jackson".to_owned();

        assert!(form.favorite());
        assert_eq!(form.platform(), Some(Platform::HboMax));
        assert_eq!(
            form.date_viewed().unwrap(),
            Some(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap())
        );
        assert!(form.actors().is_some());
    }

    #[test]
    fn movie_form_rejects_malformed_dates() {
        let mut form = movie_form();
        form.date_viewed = "02/01/2023".to_owned();
        assert!(form.date_viewed().is_err());
    }
}
