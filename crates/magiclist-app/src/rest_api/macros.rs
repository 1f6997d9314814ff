/// Generates `crud_api` module with list/count/get/create/update/delete handlers
/// for entity `$entity`, expecting `[<$entity Repository>]`, `[<Create $entity>]`
/// and `[<Update $entity>]` in scope.
#[macro_export]
macro_rules! crud_api {
    ($entity:ident) => {
        type EntityRepository = paste::paste! {[<$entity Repository>]};
        $crate::repository_from_request!(EntityRepository);
        pub mod crud_api {
            use super::*;
            use $crate::error::ApiResult;
            use $crate::rest_api::Paging;
            use $crate::state::AppState;
            use $crate::validate::Garde;
            use axum::{
                extract::{Path, Query, State},
                response::IntoResponse,
                Json,
            };
            use http::StatusCode;
            use tracing::debug;

            type CreateEntity = paste::paste! {[<Create $entity>]};
            type UpdateEntity = paste::paste! {[<Update $entity>]};

            pub async fn list(
                repository: EntityRepository,
                State(state): State<AppState>,
                Garde(Query(paging)): Garde<Query<Paging>>,
            ) -> ApiResult<impl IntoResponse> {
                debug!("Paging: {:?}", paging);
                let listing_params = paging.into_listing_params(state.config().default_page_size)?;
                let records = repository.list(listing_params).await?;
                Ok((StatusCode::OK, Json(records)))
            }

            pub async fn count(repository: EntityRepository) -> ApiResult<impl IntoResponse> {
                let count = repository.count().await?;
                Ok((StatusCode::OK, Json(count)))
            }

            pub async fn get(
                Path(id): Path<i64>,
                repository: EntityRepository,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.get(id).await?;

                Ok((StatusCode::OK, Json(record)))
            }

            pub async fn create(
                repository: EntityRepository,
                Garde(Json(payload)): Garde<Json<CreateEntity>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.create(payload).await?;

                Ok((StatusCode::CREATED, Json(record)))
            }

            pub async fn update(
                Path(id): Path<i64>,
                repository: EntityRepository,
                Garde(Json(payload)): Garde<Json<UpdateEntity>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.update(id, payload).await?;

                Ok((StatusCode::OK, Json(record)))
            }

            pub async fn delete(
                Path(id): Path<i64>,
                repository: EntityRepository,
            ) -> ApiResult<impl IntoResponse> {
                repository.delete(id).await?;

                Ok((StatusCode::NO_CONTENT, ()))
            }
        }
    };
}

/// Router with the standard CRUD routes of `crud_api` module in scope.
#[macro_export]
macro_rules! crud_router {
    () => {
        axum::Router::new()
            .route(
                "/",
                axum::routing::get(crud_api::list).post(crud_api::create),
            )
            .route("/count", axum::routing::get(crud_api::count))
            .route(
                "/{id}",
                axum::routing::get(crud_api::get)
                    .put(crud_api::update)
                    .delete(crud_api::delete),
            )
    };
}
