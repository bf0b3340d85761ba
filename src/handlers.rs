use crate::database::{hash_password, LedgerStore, StoreError, UserStore};
use crate::forms::*;
use crate::log_error;
use crate::model::*;
use crate::omdb::{self, OmdbConfig};
use actix_identity::Identity;
use actix_web::client::Client;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;
type Omdb = web::Data<OmdbConfig>;

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub notice: Option<String>,
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct FavoriteResponse {
    message: &'static str,
    favorite: bool,
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().header("location", location).finish()
}

fn render(tera: &tera::Tera, name: &str, ctx: &tera::Context) -> actix_web::Result<HttpResponse> {
    let body = tera
        .render(name, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

/// Resolves the identity cookie to the acting user once per request; every
/// store call below takes the resolved id explicitly.
fn current_user(id: &Identity, db: &sled::Db) -> actix_web::Result<Option<(u64, User)>> {
    match id.identity() {
        Some(username) => db
            .get_user_by_username(&username)
            .map_err(|err| log_error(err, "Database error")),
        None => Ok(None),
    }
}

fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "taken" => Some("Username already taken"),
        "invalid" => Some("Please fill out all required fields"),
        "wrong_password" => Some("Invalid login credentials."),
        "wrong_current" => Some("Current password incorrect!"),
        "logout" => Some("You have been logged out successfully!"),
        "required" => Some("Please login!"),
        "profile_updated" => Some("Your profile has been updated!"),
        "deleted" => Some("Your profile has been deleted!"),
        "movie_added" => Some("Movie added to your list!"),
        "movie_updated" => Some("Movie updated!"),
        "duplicate" => Some("Movie is already in your list!"),
        "bad_date" => Some("Dates must look like 2023-01-31"),
        "not_found" => Some("Movie not found"),
        _ => None,
    }
}

fn insert_notice(ctx: &mut tera::Context, notice: &Option<String>) {
    if let Some(message) = notice.as_deref().and_then(notice_message) {
        ctx.insert("notice", message);
    }
}

pub async fn index(
    id: Identity,
    tera: Tera,
    db: Db,
    query: web::Query<PageQuery>,
) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    if let Some((_user_id, user)) = current_user(&id, &db)? {
        ctx.insert("user", &user);
    }
    render(&tera, "home.html", &ctx)
}

pub async fn signup_form(tera: Tera, query: web::Query<PageQuery>) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    render(&tera, "signup.html", &ctx)
}

pub async fn signup_post(
    form: web::Form<SignupForm>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if form.validate().is_err() {
        return Ok(redirect("/signup?notice=invalid"));
    }
    match db.register(&form.username, &form.password, &form.email, form.img_url()) {
        Ok((_user_id, user)) => {
            id.remember(user.username);
            Ok(redirect("/movie-search"))
        }
        Err(StoreError::DuplicateUsername) => Ok(redirect("/signup?notice=taken")),
        Err(StoreError::Validation(_)) => Ok(redirect("/signup?notice=invalid")),
        Err(err) => Err(log_error(err, "Database error")),
    }
}

pub async fn login_form(tera: Tera, query: web::Query<PageQuery>) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    render(&tera, "login.html", &ctx)
}

pub async fn login_post(
    form: web::Form<LoginForm>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    match db
        .authenticate(&form.username, &form.password)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some((_user_id, user)) => {
            id.remember(user.username);
            Ok(redirect("/movies"))
        }
        None => Ok(redirect("/login?notice=wrong_password")),
    }
}

pub async fn logout(id: Identity) -> actix_web::Result<HttpResponse> {
    id.forget();
    Ok(redirect("/login?notice=logout"))
}

pub async fn profile(
    id: Identity,
    tera: Tera,
    db: Db,
    query: web::Query<PageQuery>,
) -> actix_web::Result<HttpResponse> {
    let (_user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    ctx.insert("user", &user);
    render(&tera, "profile.html", &ctx)
}

pub async fn profile_post(
    form: web::Form<ProfileEditForm>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    if form.validate().is_err() {
        return Ok(redirect("/profile?notice=invalid"));
    }
    // Every profile mutation re-confirms the current password.
    if db
        .authenticate(&user.username, &form.password)
        .map_err(|err| log_error(err, "Database error"))?
        .is_none()
    {
        return Ok(redirect("/profile?notice=wrong_current"));
    }
    let password_hash = match form.new_password() {
        Some(new_password) => {
            Some(hash_password(new_password).map_err(|err| log_error(err, "Hashing error"))?)
        }
        None => None,
    };
    match db.update_profile(user_id, &form.username, &form.email, form.img_url(), password_hash) {
        Ok(()) => {
            // The cookie carries the username, which may just have changed.
            id.remember(form.username.clone());
            Ok(redirect("/profile?notice=profile_updated"))
        }
        Err(StoreError::DuplicateUsername) => Ok(redirect("/profile?notice=taken")),
        Err(StoreError::Validation(_)) => Ok(redirect("/profile?notice=invalid")),
        Err(err) => Err(log_error(err, "Database error")),
    }
}

pub async fn profile_delete(
    form: web::Form<ProfileDeleteForm>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    if db
        .authenticate(&user.username, &form.password)
        .map_err(|err| log_error(err, "Database error"))?
        .is_none()
    {
        return Ok(redirect("/profile?notice=wrong_current"));
    }
    db.delete_user(user_id)
        .map_err(|err| log_error(err, "Database error"))?;
    id.forget();
    Ok(redirect("/?notice=deleted"))
}

pub async fn movies(
    id: Identity,
    tera: Tera,
    db: Db,
    query: web::Query<MoviesQuery>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    let ledger_query = LedgerQuery::parse(
        query.filter.as_deref(),
        query.sort.as_deref(),
        query.order.as_deref(),
    );
    let movies = db
        .list_entries(user_id, &ledger_query)
        .map_err(|err| log_error(err, "Database error"))?;

    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    ctx.insert("user", &user);
    ctx.insert("movies", &movies);
    ctx.insert("favorites_only", &ledger_query.favorites_only);
    if let Some((key, order)) = ledger_query.sort {
        ctx.insert("sort", key.as_str());
        ctx.insert("order", order.as_str());
    }
    render(&tera, "movies.html", &ctx)
}

pub async fn movie_detail(
    id: Identity,
    tera: Tera,
    db: Db,
    config: Omdb,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    let movie_id = path.into_inner();
    let client = Client::default();
    let movie = omdb::detail(&client, &config, &movie_id).await?;
    if !movie.ok() {
        return Ok(redirect("/movie-search?notice=not_found"));
    }
    let entry = db
        .get_entry(user_id, &movie_id)
        .map_err(|err| log_error(err, "Database error"))?;

    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    ctx.insert("user", &user);
    ctx.insert("movie", &movie);
    ctx.insert("entry", &entry);
    render(&tera, "movie-detail.html", &ctx)
}

pub async fn movie_post(
    id: Identity,
    db: Db,
    path: web::Path<String>,
    form: web::Form<MovieForm>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    let movie_id = path.into_inner();
    if form.validate().is_err() {
        return Ok(redirect(&format!("/movie/{}?notice=invalid", movie_id)));
    }
    let date_viewed = match form.date_viewed() {
        Ok(date_viewed) => date_viewed,
        Err(_) => return Ok(redirect(&format!("/movie/{}?notice=bad_date", movie_id))),
    };

    let already_added = db
        .in_ledger(user_id, &movie_id)
        .map_err(|err| log_error(err, "Database error"))?;
    if already_added {
        // Only favorite, platform and date viewed are mutable after add.
        match db.update_entry(user_id, &movie_id, form.favorite(), form.platform(), date_viewed) {
            Ok(_) => Ok(redirect("/movies?notice=movie_updated")),
            Err(err) => Err(log_error(err, "Database error")),
        }
    } else {
        let entry = LedgerEntry {
            imdb_id: movie_id,
            user_id,
            title: form.title.clone(),
            year: form.year(),
            actors: form.actors(),
            platform: form.platform(),
            imdb_img: form.imdb_img.clone(),
            favorite: form.favorite(),
            date_viewed,
            date_added: Utc::now().date_naive(),
        };
        match db.add_entry(&entry) {
            Ok(()) => Ok(redirect("/movies?notice=movie_added")),
            Err(StoreError::DuplicateEntry) => Ok(redirect("/movies?notice=duplicate")),
            Err(err) => Err(log_error(err, "Database error")),
        }
    }
}

/// Immediate add from the search results page. The catalog detail record is
/// fetched for the actors field, as the detail form would have done.
pub async fn movie_quick_add(
    id: Identity,
    db: Db,
    config: Omdb,
    path: web::Path<String>,
    payload: web::Json<QuickAddPayload>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => {
            return Ok(HttpResponse::Unauthorized().json(Message {
                message: "login required",
            }))
        }
    };
    let movie_id = path.into_inner();
    let client = Client::default();
    let detail = omdb::detail(&client, &config, &movie_id).await?;

    let entry = LedgerEntry {
        imdb_id: movie_id,
        user_id,
        title: payload.title.clone(),
        year: payload.year.chars().take(4).collect(),
        actors: if detail.actors.is_empty() {
            None
        } else {
            Some(detail.actors)
        },
        platform: None,
        imdb_img: payload.imdb_img.clone(),
        favorite: false,
        date_viewed: None,
        date_added: Utc::now().date_naive(),
    };
    match db.add_entry(&entry) {
        Ok(()) => Ok(HttpResponse::Created().json(Message {
            message: "Movie added to list!",
        })),
        Err(StoreError::DuplicateEntry) => Ok(HttpResponse::BadRequest().json(Message {
            message: "Movie is already in your list!",
        })),
        Err(err) => Err(log_error(err, "Database error")),
    }
}

pub async fn movie_delete(
    id: Identity,
    db: Db,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => {
            return Ok(HttpResponse::Unauthorized().json(Message {
                message: "login required",
            }))
        }
    };
    db.remove_entry(user_id, &path.into_inner())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(Message { message: "success" }))
}

pub async fn movie_favorite(
    id: Identity,
    db: Db,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => {
            return Ok(HttpResponse::Unauthorized().json(Message {
                message: "login required",
            }))
        }
    };
    match db.toggle_favorite(user_id, &path.into_inner()) {
        Ok(favorite) => Ok(HttpResponse::Ok().json(FavoriteResponse {
            message: "success",
            favorite,
        })),
        Err(StoreError::NotFound) => Ok(HttpResponse::NotFound().json(Message {
            message: "not in your list",
        })),
        Err(err) => Err(log_error(err, "Database error")),
    }
}

pub async fn movie_search(
    id: Identity,
    tera: Tera,
    db: Db,
    config: Omdb,
    query: web::Query<SearchQuery>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/login?notice=required")),
    };
    let mut ctx = tera::Context::new();
    insert_notice(&mut ctx, &query.notice);
    ctx.insert("user", &user);

    if let Some(term) = query.term.as_deref().filter(|term| !term.is_empty()) {
        let page = query.page.unwrap_or(1).max(1);
        let client = Client::default();
        let mut results = omdb::search(&client, &config, term, page).await?;
        if results.ok() {
            let owned = db
                .list_entries(user_id, &LedgerQuery::default())
                .map_err(|err| log_error(err, "Database error"))?
                .into_iter()
                .map(|entry| entry.imdb_id)
                .collect::<HashSet<_>>();
            for movie in &mut results.results {
                movie.in_ledger = owned.contains(&movie.imdb_id);
            }
        }
        // Probing the next page decides whether to render a next link.
        let next = omdb::search(&client, &config, term, page + 1).await?;
        ctx.insert("results", &results);
        ctx.insert("search_term", term);
        ctx.insert("page", &page);
        ctx.insert("next_page", &next.ok());
    }
    render(&tera, "movie-search.html", &ctx)
}
