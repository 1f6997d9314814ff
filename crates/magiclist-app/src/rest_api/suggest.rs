use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    suggest::SuggestEntity,
    validate::Garde,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json,
};
use garde::Validate;
use http::StatusCode;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestRequest {
    #[garde(length(min = 1, max = 4000))]
    pub prompt: String,
}

pub async fn suggest(
    Path(entity): Path<SuggestEntity>,
    State(state): State<AppState>,
    Garde(Json(request)): Garde<Json<SuggestRequest>>,
) -> ApiResult<impl IntoResponse> {
    let suggester = state.suggester().ok_or(ApiError::SuggestionsDisabled)?;
    let fields = suggester
        .suggest(entity, &request.prompt)
        .await
        .map_err(|e| ApiError::SuggestionFailed(e.to_string()))?;
    debug!("Suggested {} fields for {entity:?}", fields.len());
    Ok((StatusCode::OK, Json(fields)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/{entity}", post(suggest))
}
