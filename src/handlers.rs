use crate::core::{self, IdGenerator, Persister, Ranker};
use crate::error::Error;
use crate::models::{CreatedLocation, LocationDetail, RankedLocation};
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web::{get, post, Data, Json, JsonConfig, Path, Query, ServiceConfig};
use log::debug;
use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct AddLocation {
    name: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
}

pub(crate) async fn add_location<P, G>(Json(loc): Json<AddLocation>, persister: Data<P>, ids: Data<G>) -> Result<Json<CreatedLocation>, Error>
where
    P: Persister + 'static,
    G: IdGenerator + 'static,
{
    let cmd = core::validate_location(loc.name, loc.longitude, loc.latitude)?;
    let res = core::add_location(persister.get_ref(), ids.get_ref(), cmd).await?;
    Ok(Json(res))
}

/// Coordinates arrive as raw strings so that a bad value is reported per field.
#[derive(Deserialize)]
pub(crate) struct NearbyLocation {
    longitude: Option<String>,
    latitude: Option<String>,
}

fn parse_coordinate(raw: Option<&str>, invalid: &'static str) -> Result<f64, Error> {
    raw.and_then(|v| v.trim().parse::<f64>().ok()).ok_or(Error::Validation(invalid))
}

pub(crate) async fn nearby_locations<P, R>(Query(query): Query<NearbyLocation>, persister: Data<P>, ranker: Data<R>) -> Result<Json<Vec<RankedLocation>>, Error>
where
    P: Persister + 'static,
    R: Ranker + 'static,
{
    let longitude = parse_coordinate(query.longitude.as_deref(), "Invalid longitude")?;
    let latitude = parse_coordinate(query.latitude.as_deref(), "Invalid latitude")?;
    let point = core::validate_query_point(longitude, latitude)?;
    let res = core::nearby_locations(persister.get_ref(), ranker.get_ref(), point).await?;
    Ok(Json(res))
}

pub(crate) async fn location_detail<P>(id: Path<String>, persister: Data<P>) -> Result<Json<LocationDetail>, Error>
where
    P: Persister + 'static,
{
    let res = core::location_detail(persister.get_ref(), &id).await?;
    Ok(Json(res))
}

pub(crate) fn routes<P, G, R>(cfg: &mut ServiceConfig)
where
    P: Persister + 'static,
    G: IdGenerator + 'static,
    R: Ranker + 'static,
{
    cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
        debug!("rejected request body: {}", err);
        Error::Validation("Invalid request body").into()
    }))
    .route("/toilets", post().to(add_location::<P, G>))
    .route("/toilets", get().to(nearby_locations::<P, R>))
    .route("/toilets/{id}", get().to(location_detail::<P>));
}

/// Any origin may call the API; only `Content-Type` is needed as a request header.
pub(crate) fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allowed_header(header::CONTENT_TYPE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::test::{FlakyPersister, SeqIdGenerator};
    use crate::core::{LOCATION_PREFIX, POSTS_PREFIX};
    use crate::persisters::MemoryPersister;
    use crate::rankers::{NearestRanker, NEARBY_LIMIT};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    macro_rules! app {
        ($persister:ty, $value:expr) => {
            test::init_service(
                App::new()
                    .wrap(cors())
                    .app_data(Data::new($value))
                    .app_data(Data::new(SeqIdGenerator::new()))
                    .app_data(Data::new(NearestRanker::new(NEARBY_LIMIT)))
                    .configure(routes::<$persister, SeqIdGenerator, NearestRanker>),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_create_and_fetch() {
        let app = app!(MemoryPersister, MemoryPersister::new());
        let req = test::TestRequest::post()
            .uri("/toilets")
            .set_json(json!({"name": "Alexanderplatz", "longitude": 13.4132, "latitude": 52.5219}))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created, json!({"id": "id-1", "name": "Alexanderplatz"}));

        let req = test::TestRequest::get().uri("/toilets/id-1").to_request();
        let detail: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            detail,
            json!({"id": "id-1", "name": "Alexanderplatz", "longitude": 13.4132, "latitude": 52.5219, "posts": []})
        );
    }

    // Every store call fails, so any store access turns a 400 into a 500.
    fn unreachable_store(memory: MemoryPersister) -> FlakyPersister {
        let mut persister = FlakyPersister::new(memory);
        persister.fail_set = Some(String::new());
        persister.fail_get = Some(String::new());
        persister.fail_list = true;
        persister
    }

    #[actix_web::test]
    async fn test_create_rejects_invalid_input() {
        let memory = MemoryPersister::new();
        let app = app!(FlakyPersister, unreachable_store(memory.clone()));
        let cases = vec![
            (json!({"longitude": 1.0, "latitude": 1.0}), "Invalid name"),
            (json!({"name": "", "longitude": 1.0, "latitude": 1.0}), "Invalid name"),
            (json!({"name": "a", "latitude": 1.0}), "Invalid longitude"),
            (json!({"name": "a", "longitude": 180.5, "latitude": 1.0}), "Invalid longitude"),
            (json!({"name": "a", "longitude": 1.0, "latitude": -90.5}), "Invalid latitude"),
            (json!({"name": "a", "longitude": "east", "latitude": 1.0}), "Invalid request body"),
        ];
        for (body, message) in cases {
            let req = test::TestRequest::post().uri("/toilets").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({ "error": message }));
        }
        assert!(memory.list(LOCATION_PREFIX).await.unwrap().is_empty());
        assert!(memory.list(POSTS_PREFIX).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_unknown_toilet() {
        let app = app!(MemoryPersister, MemoryPersister::new());
        let req = test::TestRequest::get().uri("/toilets/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "No such toilet"}));
    }

    #[actix_web::test]
    async fn test_orphaned_toilet() {
        let mut persister = FlakyPersister::new(MemoryPersister::new());
        persister.fail_set = Some(POSTS_PREFIX.to_owned());
        let app = app!(FlakyPersister, persister);
        let req = test::TestRequest::post()
            .uri("/toilets")
            .set_json(json!({"name": "a", "longitude": 1.0, "latitude": 1.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Failed to create toilet"}));

        let req = test::TestRequest::get().uri("/toilets/id-1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Failed to get toilet"}));
    }

    #[actix_web::test]
    async fn test_nearby() {
        let app = app!(MemoryPersister, MemoryPersister::new());
        for i in 0..12 {
            let req = test::TestRequest::post()
                .uri("/toilets")
                .set_json(json!({"name": format!("t{}", i), "longitude": 0.0, "latitude": 0.01 * (12 - i) as f64}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }
        let req = test::TestRequest::get().uri("/toilets?longitude=0&latitude=0").to_request();
        let ranked: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ranked.len(), NEARBY_LIMIT);
        assert_eq!(ranked[0]["name"], json!("t11"));
        assert_eq!(ranked[9]["name"], json!("t2"));
        let distances: Vec<f64> = ranked.iter().map(|r| r["distance"].as_f64().unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[actix_web::test]
    async fn test_nearby_rejects_bad_query() {
        let app = app!(FlakyPersister, unreachable_store(MemoryPersister::new()));
        let cases = vec![
            ("/toilets?latitude=1", "Invalid longitude"),
            ("/toilets?longitude=abc&latitude=1", "Invalid longitude"),
            ("/toilets?longitude=NaN&latitude=1", "Invalid longitude"),
            ("/toilets?longitude=1&latitude=91", "Invalid latitude"),
        ];
        for (uri, message) in cases {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({ "error": message }));
        }
    }

    #[actix_web::test]
    async fn test_nearby_storage_failure() {
        let mut persister = FlakyPersister::new(MemoryPersister::new());
        persister.fail_list = true;
        let app = app!(FlakyPersister, persister);
        let req = test::TestRequest::get().uri("/toilets?longitude=0&latitude=0").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Failed to get toilet list"}));
    }

    #[actix_web::test]
    async fn test_cors_headers() {
        let app = app!(MemoryPersister, MemoryPersister::new());
        let req = test::TestRequest::get()
            .uri("/toilets?longitude=0&latitude=0")
            .insert_header((header::ORIGIN, "http://map.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }
}
