pub mod band;
pub mod block;
mod macros;
pub mod member;
mod paging;
pub mod repertoire;
pub mod show;
pub mod song;
pub mod suggest;

pub use paging::Paging;

use crate::state::AppState;

/// All entity routers, to be nested under `/api`.
pub fn api_router() -> axum::Router<AppState> {
    axum::Router::new()
        .nest("/band", band::router())
        .nest("/song", song::router())
        .nest("/block", block::router())
        .nest("/repertoire", repertoire::router())
        .nest("/show", show::router())
        .nest("/member", member::router())
        .nest("/suggest", suggest::router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr as _;
    use tower::ServiceExt as _;

    async fn test_router() -> axum::Router {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        magiclist_dal::MIGRATOR.run(&pool).await.unwrap();
        let state = AppState::new(AppConfig::default(), pool, None);
        api_router().with_state(state)
    }

    async fn call(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let router = test_router().await;

        let (status, body) = call(&router, "POST", "/band", Some(json!({"nome": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detalhes"]["nome"].is_string());

        let (status, body) = call(&router, "POST", "/band", Some(json!({"genero": "rock"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, count) = call(&router, "GET", "/band/count", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count, json!(0));

        let (status, _) = call(&router, "GET", "/band/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&router, "GET", "/band/42/songs", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&router, "GET", "/band?sort=password", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_block_songs_replacement() {
        let router = test_router().await;

        let (status, band) = call(&router, "POST", "/band", Some(json!({"nome": "Banda"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let band_id = band["id"].as_i64().unwrap();
        let (_, song) = call(
            &router,
            "POST",
            "/song",
            Some(json!({"band_id": band_id, "titulo": "Primeira"})),
        )
        .await;
        let song_id = song["id"].as_i64().unwrap();
        let (status, block) = call(
            &router,
            "POST",
            "/block",
            Some(json!({"band_id": band_id, "nome": "Bloco", "songs": [{"song_id": song_id, "ordem": 0}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let block_id = block["id"].as_i64().unwrap();

        let uri = format!("/block/{block_id}/songs");
        let (status, body) = call(
            &router,
            "PUT",
            &uri,
            Some(json!([{"song_id": song_id, "ordem": 0}, {"song_id": 555, "ordem": 1}])),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detalhes"]["ids"], json!([555]));

        let (status, body) = call(&router, "PUT", &uri, Some(json!([{"song_id": song_id, "ordem": -1}]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detalhes"].is_object());

        let too_many: Vec<Value> = (0..1001)
            .map(|i| json!({"song_id": song_id, "ordem": i}))
            .collect();
        let (status, _) = call(&router, "PUT", &uri, Some(Value::Array(too_many))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, other) = call(&router, "POST", "/band", Some(json!({"nome": "Outra"}))).await;
        let (_, foreign) = call(
            &router,
            "POST",
            "/song",
            Some(json!({"band_id": other["id"], "titulo": "Alheia"})),
        )
        .await;
        let (status, body) = call(
            &router,
            "PUT",
            &uri,
            Some(json!([{"song_id": foreign["id"], "ordem": 0}])),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detalhes"]["ids"], json!([foreign["id"]]));

        let (status, songs) = call(&router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(songs.as_array().unwrap().len(), 1);
        assert_eq!(songs[0]["song_id"], song_id);
    }

    #[tokio::test]
    async fn test_suggest_disabled() {
        let router = test_router().await;
        let (status, _) = call(&router, "POST", "/suggest/band", Some(json!({"prompt": "samba band from Rio"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = call(&router, "POST", "/suggest/unknown", Some(json!({"prompt": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
