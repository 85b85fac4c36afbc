#![recursion_limit = "512"]

use {
    sqlx::{
        ConnectOptions as _,
        postgres::{
            PgConnectOptions,
            PgPoolOptions,
        },
    },
    crate::{
        import::Importer,
        prelude::*,
    },
};

mod config;
mod entrant;
mod form;
mod formula;
mod http;
mod import;
mod player;
mod prelude;
mod tier;
mod tournament;

include!(concat!(env!("OUT_DIR"), "/version.rs"));

#[allow(unused)] // variants only constructed under conditional compilation
#[derive(Default, Clone, Copy)]
enum Environment {
    #[cfg_attr(any(feature = "production", not(any(feature = "dev", feature = "local", debug_assertions))), default)]
    Production,
    #[cfg_attr(any(feature = "dev", all(debug_assertions, not(feature = "production"), not(feature = "local"))), default)]
    Dev,
    #[cfg_attr(feature = "local", default)]
    Local,
}

impl Environment {
    fn is_dev(&self) -> bool {
        match self {
            Self::Production => false,
            Self::Dev => true,
            Self::Local => true,
        }
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Create the database tables and seed the default tiers, then exit
    InitDb,
}

#[derive(clap::Parser)]
#[clap(version = CLAP_VERSION)]
struct Args {
    #[clap(long, default_value_t = 4000)]
    port: u16,
    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Base64(#[from] base64::DecodeError),
    #[error(transparent)] Config(#[from] config::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Rocket(#[from] rocket::Error),
    #[error(transparent)] Sql(#[from] sqlx::Error),
}

#[wheel::main(rocket)]
async fn main(Args { port, subcommand }: Args) -> Result<(), Error> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("Thread panic: {:?}", info);
        default_panic_hook(info)
    }));
    let config = Config::load().await?;
    let mut db_options = PgConnectOptions::default()
        .username("tourney-tracker")
        .database(if Environment::default().is_dev() { "tourney_tracker_dev" } else { "tourney_tracker" })
        .application_name("tourney-tracker")
        .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));
    if let Some(ref db_config) = config.database {
        if let Some(ref host) = db_config.host {
            db_options = db_options.host(host);
        }
        if let Some(port) = db_config.port {
            db_options = db_options.port(port);
        }
        if let Some(ref username) = db_config.username {
            db_options = db_options.username(username);
        }
        if let Some(ref password) = db_config.password {
            db_options = db_options.password(password);
        }
        if let Some(ref database) = db_config.database {
            db_options = db_options.database(database);
        }
    }
    let db_pool = PgPoolOptions::default()
        .max_connections(16)
        .connect_with(db_options)
        .await?;
    match subcommand {
        Some(Subcommand::InitDb) => {
            sqlx::raw_sql(include_str!("../assets/schema.sql")).execute(&db_pool).await?;
            log::info!("database schema initialized");
        }
        None => {
            let http_client = reqwest::Client::builder()
                .user_agent(concat!("tourney-tracker/", env!("CARGO_PKG_VERSION")))
                .timeout(config.http_timeout())
                .use_rustls_tls()
                .hickory_dns(true)
                .https_only(true)
                .build()?;
            let importer = Importer::new(http_client, &config);
            log::info!("listening on port {port}");
            let rocket = http::rocket(db_pool, importer, config, port).await?;
            rocket.launch().await?;
        }
    }
    Ok(())
}
