use crate::state::AppState;
use axum::routing::get;
use magiclist_dal::repertoire::{CreateRepertoire, RepertoireRepository, UpdateRepertoire};

crate::crud_api!(Repertoire);

mod membership_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::validate::Garde;
    use axum::{extract::Path, response::IntoResponse, Json};
    use http::StatusCode;
    use magiclist_dal::repertoire::BlockList;
    use tracing::debug;

    pub async fn blocks(
        Path(id): Path<i64>,
        repository: RepertoireRepository,
    ) -> ApiResult<impl IntoResponse> {
        let blocks = repository.blocks(id).await?;
        Ok((StatusCode::OK, Json(blocks)))
    }

    pub async fn replace_blocks(
        Path(id): Path<i64>,
        repository: RepertoireRepository,
        Garde(Json(BlockList(blocks))): Garde<Json<BlockList>>,
    ) -> ApiResult<impl IntoResponse> {
        debug!("Replacing blocks of repertoire {id} with {} entries", blocks.len());
        let record = repository.replace_blocks(id, &blocks).await?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn setlist(
        Path(id): Path<i64>,
        repository: RepertoireRepository,
    ) -> ApiResult<impl IntoResponse> {
        let setlist = repository.setlist(id).await?;
        Ok((StatusCode::OK, Json(setlist)))
    }
}

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!()
        .route(
            "/{id}/blocks",
            get(membership_api::blocks).put(membership_api::replace_blocks),
        )
        .route("/{id}/setlist", get(membership_api::setlist))
}
