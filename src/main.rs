mod config;
mod core;
mod error;
mod generators;
mod handlers;
mod models;
mod persisters;
mod rankers;
mod validators;

use crate::config::{Config, StoreBackend};
use crate::core::Persister;
use crate::generators::UuidGenerator;
use crate::persisters::{FsPersister, MemoryPersister, RedisPersister, TimeoutPersister};
use crate::rankers::{NearestRanker, NEARBY_LIMIT};
use actix_web::middleware::Logger;
use actix_web::web::Data;
use anyhow::Context;
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid TOILETS_* configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match config.store {
        StoreBackend::Fs => {
            info!("using fs store at {}", config.data_dir);
            serve(&config, FsPersister::new(&config.data_dir)).await
        }
        StoreBackend::Redis => {
            info!("using redis store at {}", config.redis_url);
            serve(&config, RedisPersister::connect(&config.redis_url).await?).await
        }
        StoreBackend::Memory => {
            info!("using in-memory store, nothing will survive a restart");
            serve(&config, MemoryPersister::new()).await
        }
    }
}

async fn serve<P>(config: &Config, persister: P) -> anyhow::Result<()>
where
    P: Persister + Send + Sync + 'static,
{
    let persister = Data::new(TimeoutPersister::new(persister, config.store_timeout()));
    let ids = Data::new(UuidGenerator);
    let ranker = Data::new(NearestRanker::new(NEARBY_LIMIT));
    info!("listening on {}", config.bind_address);
    actix_web::HttpServer::new(move || {
        actix_web::App::new()
            .wrap(handlers::cors())
            .wrap(Logger::default())
            .app_data(persister.clone())
            .app_data(ids.clone())
            .app_data(ranker.clone())
            .configure(handlers::routes::<TimeoutPersister<P>, UuidGenerator, NearestRanker>)
    })
    .bind(&config.bind_address)
    .with_context(|| format!("failed to bind {}", config.bind_address))?
    .run()
    .await?;
    Ok(())
}
