use crate::state::AppState;
use axum::routing::get;
use magiclist_dal::band::{BandRepository, CreateBand, UpdateBand};

crate::crud_api!(Band);

mod band_api {
    use super::*;
    use crate::error::ApiResult;
    use crate::rest_api::Paging;
    use crate::validate::Garde;
    use axum::{
        extract::{Path, Query, State},
        response::IntoResponse,
        Json,
    };
    use http::StatusCode;
    use magiclist_dal::{
        block::BlockRepository, member::MemberRepository, repertoire::RepertoireRepository,
        show::ShowRepository, song::SongRepository, ListingParams,
    };

    async fn listing_for_band(
        bands: &BandRepository,
        id: i64,
        state: &AppState,
        paging: Paging,
    ) -> ApiResult<ListingParams> {
        if !bands.exists(id).await? {
            return Err(magiclist_dal::Error::RecordNotFound(format!("band {id}")).into());
        }
        paging.into_listing_params(state.config().default_page_size)
    }

    pub async fn songs(
        Path(id): Path<i64>,
        bands: BandRepository,
        repository: SongRepository,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
    ) -> ApiResult<impl IntoResponse> {
        let params = listing_for_band(&bands, id, &state, paging).await?;
        let records = repository.list_by_band(params, id).await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn blocks(
        Path(id): Path<i64>,
        bands: BandRepository,
        repository: BlockRepository,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
    ) -> ApiResult<impl IntoResponse> {
        let params = listing_for_band(&bands, id, &state, paging).await?;
        let records = repository.list_by_band(params, id).await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn repertoires(
        Path(id): Path<i64>,
        bands: BandRepository,
        repository: RepertoireRepository,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
    ) -> ApiResult<impl IntoResponse> {
        let params = listing_for_band(&bands, id, &state, paging).await?;
        let records = repository.list_by_band(params, id).await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn shows(
        Path(id): Path<i64>,
        bands: BandRepository,
        repository: ShowRepository,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
    ) -> ApiResult<impl IntoResponse> {
        let params = listing_for_band(&bands, id, &state, paging).await?;
        let records = repository.list_by_band(params, id).await?;
        Ok((StatusCode::OK, Json(records)))
    }

    pub async fn members(
        Path(id): Path<i64>,
        bands: BandRepository,
        repository: MemberRepository,
        State(state): State<AppState>,
        Garde(Query(paging)): Garde<Query<Paging>>,
    ) -> ApiResult<impl IntoResponse> {
        let params = listing_for_band(&bands, id, &state, paging).await?;
        let records = repository.list_by_band(params, id).await?;
        Ok((StatusCode::OK, Json(records)))
    }
}

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!()
        .route("/{id}/songs", get(band_api::songs))
        .route("/{id}/blocks", get(band_api::blocks))
        .route("/{id}/repertoires", get(band_api::repertoires))
        .route("/{id}/shows", get(band_api::shows))
        .route("/{id}/members", get(band_api::members))
}
