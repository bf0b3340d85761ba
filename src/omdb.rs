//! Client for the OMDb catalog. Handlers resolve movie metadata here and
//! hand the ledger already-resolved data; the stores never touch the
//! network.

use crate::log_error;
use actix_web::client::Client;
use serde::{Deserialize, Serialize};

const API_BASE_URL: &str = "http://www.omdbapi.com/";

#[derive(Clone)]
pub struct OmdbConfig {
    pub api_key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SearchResult {
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Poster")]
    pub poster: String,
    /// Not part of the OMDb payload; set by the search handler when the
    /// movie is already in the requesting user's ledger.
    #[serde(default)]
    pub in_ledger: bool,
}

/// One page of search results. OMDb signals both "no more pages" and every
/// other failure through `Response: "False"`.
#[derive(Serialize, Deserialize, Debug)]
pub struct SearchPage {
    #[serde(rename = "Search", default)]
    pub results: Vec<SearchResult>,
    #[serde(rename = "totalResults", default)]
    pub total_results: Option<String>,
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

impl SearchPage {
    pub fn ok(&self) -> bool {
        self.response == "True"
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MovieDetail {
    #[serde(rename = "imdbID", default)]
    pub imdb_id: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Year", default)]
    pub year: String,
    #[serde(rename = "Actors", default)]
    pub actors: String,
    #[serde(rename = "Poster", default)]
    pub poster: String,
    #[serde(rename = "Plot", default)]
    pub plot: String,
    #[serde(rename = "Response")]
    pub response: String,
}

impl MovieDetail {
    pub fn ok(&self) -> bool {
        self.response == "True"
    }
}

pub async fn search(
    client: &Client,
    config: &OmdbConfig,
    term: &str,
    page: u32,
) -> actix_web::Result<SearchPage> {
    let page = page.to_string();
    let mut response = client
        .get(API_BASE_URL)
        .query(&[
            ("apikey", config.api_key.as_str()),
            ("s", term),
            ("type", "movie"),
            ("page", page.as_str()),
        ])
        .map_err(|err| log_error(err, "Bad search request"))?
        .send()
        .await
        .map_err(|err| log_error(err, "Movie search failed"))?;
    response
        .json::<SearchPage>()
        .await
        .map_err(|err| log_error(err, "Bad search response"))
}

pub async fn detail(
    client: &Client,
    config: &OmdbConfig,
    imdb_id: &str,
) -> actix_web::Result<MovieDetail> {
    let mut response = client
        .get(API_BASE_URL)
        .query(&[("apikey", config.api_key.as_str()), ("i", imdb_id)])
        .map_err(|err| log_error(err, "Bad detail request"))?
        .send()
        .await
        .map_err(|err| log_error(err, "Movie lookup failed"))?;
    response
        .json::<MovieDetail>()
        .await
        .map_err(|err| log_error(err, "Bad detail response"))
}
