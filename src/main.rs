use std::io;

use actix_web::{middleware, web, App, HttpServer};

mod config;
mod db;
mod error;
mod forms;
mod models;
mod query;
mod render;
mod schema;
mod tracking;
mod views;

use crate::config::Config;
use crate::db::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    // set up database connection pool
    let pool = db::build_pool(&config.database_url, config.pool_size).map_err(io::Error::other)?;
    {
        let mut conn = pool.get().map_err(io::Error::other)?;
        db::run_migrations(&mut conn).map_err(io::Error::other)?;
    }
    let store = Store::new(pool);

    log::info!("starting HTTP server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(store.clone()))
            .wrap(middleware::Logger::default())
            .configure(views::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
