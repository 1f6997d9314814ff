use crate::state::AppState;
use axum::routing::put;
use magiclist_dal::show::{CreateShow, ShowRepository, UpdateShow};

crate::crud_api!(Show);

mod status_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::validate::Garde;
    use axum::{response::IntoResponse, Json};
    use http::StatusCode;
    use magiclist_dal::show::BulkStatusUpdate;

    pub async fn update_many(
        repository: ShowRepository,
        Garde(Json(payload)): Garde<Json<BulkStatusUpdate>>,
    ) -> ApiResult<impl IntoResponse> {
        let report = repository
            .set_status_many(&payload.ids, payload.status)
            .await;
        Ok((StatusCode::OK, Json(report)))
    }
}

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!().route("/status", put(status_api::update_many))
}
