use axum::{extract::State, routing::get, Router};
use tracing::instrument;

use super::{
    dto::{CategoryList, CategoryPayload, CategoryRequest},
    services,
};
use crate::{
    envelope::{AffectedRows, ApiResponse},
    error::AppError,
    extract::{EntityId, ValidatedJson},
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<ApiResponse, AppError> {
    let categories = services::list(&state).await?;
    Ok(ApiResponse::ok(
        "Categories fetched successfully",
        CategoryList { categories },
    ))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<ApiResponse, AppError> {
    let category = services::get(&state, id).await?;
    Ok(ApiResponse::ok(
        "Category fetched successfully",
        CategoryPayload { category },
    ))
}

#[instrument(skip(state, fields))]
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(fields): ValidatedJson<CategoryRequest>,
) -> Result<ApiResponse, AppError> {
    let category = services::create(&state, fields).await?;
    Ok(ApiResponse::ok(
        "Category created successfully",
        CategoryPayload { category },
    ))
}

#[instrument(skip(state, fields))]
pub async fn update_category(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    ValidatedJson(fields): ValidatedJson<CategoryRequest>,
) -> Result<ApiResponse, AppError> {
    let affected_rows = services::update(&state, id, fields).await?;
    Ok(ApiResponse::ok(
        "Category updated successfully",
        AffectedRows { affected_rows },
    ))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<ApiResponse, AppError> {
    let affected_rows = services::delete(&state, id).await?;
    Ok(ApiResponse::ok(
        "Category deleted successfully",
        AffectedRows { affected_rows },
    ))
}
