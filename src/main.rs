mod database;
mod forms;
mod handlers;
mod model;
mod omdb;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{error, middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use database::{LedgerStore, StoreError, UserStore};
use log::{debug, warn};
use model::LedgerEntry;

pub fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

fn io_error<E: std::fmt::Debug>(err: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{:?}", err))
}

/// Two demo accounts with a starter entry, enabled with MOVIELOG_SEED=1.
fn seed_demo(db: &sled::Db) -> Result<(), StoreError> {
    if db.get_user_by_username("test")?.is_some() {
        return Ok(());
    }
    let (user_id, _) = db.register(
        "test",
        "password",
        "test@test.com",
        Some("https://source.unsplash.com/random/300x300".to_owned()),
    )?;
    db.register("test2", "password2", "test@test.com", None)?;
    db.add_entry(&LedgerEntry {
        imdb_id: "tt0110912".to_owned(),
        user_id,
        title: "Pulp Fiction".to_owned(),
        year: "1994".to_owned(),
        actors: Some("John Travolta, Uma Thurman, Samuel L. Jackson".to_owned()),
        platform: None,
        imdb_img: "https://m.media-amazon.com/images/M/pulp-fiction.jpg".to_owned(),
        favorite: true,
        date_viewed: None,
        date_added: Utc::now().date_naive(),
    })?;
    Ok(())
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "movielog=debug,actix_web=info");
    }
    env_logger::init();

    // The identity cookie key, zero-padded to the 32 bytes the policy needs.
    let secret = std::env::var("MOVIELOG_SECRET").unwrap_or_default();
    if secret.is_empty() {
        warn!("MOVIELOG_SECRET is not set, using an all-zero cookie key");
    }
    let mut private_key = [0u8; 32];
    for (dst, src) in private_key.iter_mut().zip(secret.bytes()) {
        *dst = src;
    }

    let api_key = std::env::var("OMDB_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        warn!("OMDB_API_KEY is not set, movie search will not work");
    }
    let omdb_config = omdb::OmdbConfig { api_key };

    let db_path = std::env::var("MOVIELOG_DB").unwrap_or_else(|_| "movielog_db".to_owned());
    let db = sled::open(&db_path).map_err(io_error)?;
    if std::env::var("MOVIELOG_SEED").is_ok() {
        seed_demo(&db).map_err(io_error)?;
    }

    let tera = tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();

    let bind = std::env::var("MOVIELOG_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&private_key)
                    .name("auth-cookie")
                    .secure(false),
            ))
            .data(tera.clone())
            .data(db.clone())
            .data(omdb_config.clone())
            .service(actix_files::Files::new(
                "/static",
                concat!(env!("CARGO_MANIFEST_DIR"), "/static"),
            ))
            .route("/", web::get().to(handlers::index))
            .route("/signup", web::get().to(handlers::signup_form))
            .route("/signup", web::post().to(handlers::signup_post))
            .route("/login", web::get().to(handlers::login_form))
            .route("/login", web::post().to(handlers::login_post))
            .route("/logout", web::get().to(handlers::logout))
            .route("/profile", web::get().to(handlers::profile))
            .route("/profile", web::post().to(handlers::profile_post))
            .route("/profile/delete", web::post().to(handlers::profile_delete))
            .route("/movies", web::get().to(handlers::movies))
            .route("/movie-search", web::get().to(handlers::movie_search))
            .route("/movie/{id}", web::get().to(handlers::movie_detail))
            .route("/movie/{id}", web::post().to(handlers::movie_post))
            .route("/movie/{id}", web::delete().to(handlers::movie_delete))
            .route("/movie/{id}/add", web::post().to(handlers::movie_quick_add))
            .route("/movie/{id}/favorite", web::post().to(handlers::movie_favorite))
    })
    .bind(&bind)?
    .run()
    .await
}
