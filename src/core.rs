use crate::error::{Error, StoreError};
use crate::models::{CreatedLocation, Location, LocationCommand, LocationDetail, Post, QueryPoint, RankedLocation};
use crate::validators::{is_valid_id, is_valid_latitude, is_valid_longitude, is_valid_name};
use futures::future::try_join_all;
use log::{debug, error, info};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub(crate) const LOCATION_PREFIX: &str = "toilets";
pub(crate) const POSTS_PREFIX: &str = "toilet-posts";

pub(crate) type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a>>;

/// Durable mapping from key path to JSON value.
pub(crate) trait Persister {
    /// Missing keys fail with `StoreError::NotFound`.
    fn get<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Value>;
    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()>;
    /// Full key paths of every entry directly under `prefix`.
    fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>>;
}

pub(crate) trait IdGenerator {
    fn generate(&self) -> String;
}

pub(crate) trait Ranker {
    fn rank(&self, locations: Vec<Location>, point: QueryPoint) -> Vec<RankedLocation>;
}

pub(crate) fn location_key(id: &str) -> String {
    format!("{}/{}", LOCATION_PREFIX, id)
}

pub(crate) fn posts_key(id: &str) -> String {
    format!("{}/{}", POSTS_PREFIX, id)
}

pub(crate) fn validate_location(
    name: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
) -> Result<LocationCommand, Error> {
    let name = match name {
        Some(name) if is_valid_name(&name) => name,
        _ => return Err(Error::Validation("Invalid name")),
    };
    let longitude = longitude.filter(|v| is_valid_longitude(*v)).ok_or(Error::Validation("Invalid longitude"))?;
    let latitude = latitude.filter(|v| is_valid_latitude(*v)).ok_or(Error::Validation("Invalid latitude"))?;
    Ok(LocationCommand {
        name,
        longitude,
        latitude,
    })
}

pub(crate) fn validate_query_point(longitude: f64, latitude: f64) -> Result<QueryPoint, Error> {
    if !is_valid_longitude(longitude) {
        return Err(Error::Validation("Invalid longitude"));
    }
    if !is_valid_latitude(latitude) {
        return Err(Error::Validation("Invalid latitude"));
    }
    Ok(QueryPoint { longitude, latitude })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Backend(anyhow::Error::from(e).context(format!("malformed record at {}", path))))
}

/// Writes the location record and then its empty post list. The two writes are
/// not transactional: if the second one fails the location record stays behind
/// without posts and the caller is told the creation failed.
pub(crate) async fn add_location<P, G>(persister: &P, ids: &G, cmd: LocationCommand) -> Result<CreatedLocation, Error>
where
    P: Persister,
    G: IdGenerator,
{
    const FAILED: &str = "Failed to create toilet";
    let id = ids.generate();
    let record = encode(&cmd).map_err(|e| Error::storage(FAILED, e))?;
    if let Err(e) = persister.set(&location_key(&id), record).await {
        error!("failed to save toilet {} ({:?}): {:#}", id, cmd, e);
        return Err(Error::storage(FAILED, e));
    }
    let posts: Vec<Post> = Vec::new();
    if let Err(e) = persister.set(&posts_key(&id), Value::Array(posts)).await {
        error!("failed to create empty posts list for toilet {} ({}), location record is orphaned: {:#}", id, cmd.name, e);
        return Err(Error::storage(FAILED, e));
    }
    info!("created toilet {} ({})", id, cmd.name);
    Ok(CreatedLocation { id, name: cmd.name })
}

pub(crate) async fn location_detail<P: Persister>(persister: &P, id: &str) -> Result<LocationDetail, Error> {
    const FAILED: &str = "Failed to get toilet";
    if !is_valid_id(id) {
        return Err(Error::NotFound);
    }
    let key = location_key(id);
    let cmd: LocationCommand = match persister.get(&key).await {
        Ok(value) => decode(&key, value).map_err(|e| {
            error!("failed to get toilet {}: {:#}", id, e);
            Error::storage(FAILED, e)
        })?,
        Err(StoreError::NotFound(_)) => return Err(Error::NotFound),
        Err(e) => {
            error!("failed to get toilet {}: {:#}", id, e);
            return Err(Error::storage(FAILED, e));
        }
    };
    // A missing post list here means an orphaned location, which is a storage fault.
    let key = posts_key(id);
    let posts: Vec<Post> = match persister.get(&key).await.and_then(|value| decode(&key, value)) {
        Ok(posts) => posts,
        Err(e) => {
            error!("failed to get posts for toilet {}: {:#}", id, e);
            return Err(Error::storage(FAILED, e));
        }
    };
    Ok(LocationDetail {
        location: Location::from_command(id.to_owned(), cmd),
        posts,
    })
}

async fn fetch_location<P: Persister>(persister: &P, key: String) -> Result<Location, StoreError> {
    let id = match key.strip_prefix(LOCATION_PREFIX).and_then(|rest| rest.strip_prefix('/')) {
        Some(id) => id.to_owned(),
        None => return Err(StoreError::Backend(anyhow::anyhow!("unexpected key {} in location listing", key))),
    };
    let value = persister.get(&key).await?;
    let cmd: LocationCommand = decode(&key, value)?;
    Ok(Location::from_command(id, cmd))
}

/// Reads every location concurrently. The first failing read fails the whole
/// listing; nothing partial is returned.
pub(crate) async fn all_locations<P: Persister>(persister: &P) -> Result<Vec<Location>, Error> {
    const FAILED: &str = "Failed to get toilet list";
    let keys = persister.list(LOCATION_PREFIX).await.map_err(|e| {
        error!("failed to list toilets: {:#}", e);
        Error::storage(FAILED, e)
    })?;
    try_join_all(keys.into_iter().map(|key| fetch_location(persister, key)))
        .await
        .map_err(|e| {
            error!("failed to get toilet list: {:#}", e);
            Error::storage(FAILED, e)
        })
}

pub(crate) async fn nearby_locations<P, R>(persister: &P, ranker: &R, point: QueryPoint) -> Result<Vec<RankedLocation>, Error>
where
    P: Persister,
    R: Ranker,
{
    let locations = all_locations(persister).await?;
    if locations.is_empty() {
        debug!("nearby query at ({}, {}) over an empty store", point.longitude, point.latitude);
    }
    Ok(ranker.rank(locations, point))
}
