use crate::state::AppState;
use axum::routing::get;
use magiclist_dal::block::{BlockRepository, CreateBlock, UpdateBlock};

crate::crud_api!(Block);

mod membership_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::validate::Garde;
    use axum::{extract::Path, response::IntoResponse, Json};
    use http::StatusCode;
    use magiclist_dal::block::SongList;
    use tracing::debug;

    pub async fn songs(
        Path(id): Path<i64>,
        repository: BlockRepository,
    ) -> ApiResult<impl IntoResponse> {
        let songs = repository.songs(id).await?;
        Ok((StatusCode::OK, Json(songs)))
    }

    pub async fn replace_songs(
        Path(id): Path<i64>,
        repository: BlockRepository,
        Garde(Json(SongList(songs))): Garde<Json<SongList>>,
    ) -> ApiResult<impl IntoResponse> {
        debug!("Replacing songs of block {id} with {} entries", songs.len());
        let record = repository.replace_songs(id, &songs).await?;
        Ok((StatusCode::OK, Json(record)))
    }
}

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!().route(
        "/{id}/songs",
        get(membership_api::songs).put(membership_api::replace_songs),
    )
}
