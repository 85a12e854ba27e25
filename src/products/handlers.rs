use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    Router,
};
use tracing::instrument;

use super::{
    dto::{ProductList, ProductPayload, ProductRequest},
    services,
};
use crate::{
    envelope::{AffectedRows, ApiResponse},
    error::AppError,
    extract::EntityId,
    state::AppState,
    upload::{ProductImage, Uploaded, MAX_UPLOAD_BYTES},
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
}

#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> Result<ApiResponse, AppError> {
    let products = services::list(&state).await?;
    Ok(ApiResponse::ok(
        "Products fetched successfully",
        ProductList { products },
    ))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<ApiResponse, AppError> {
    let product = services::get(&state, id).await?;
    Ok(ApiResponse::ok(
        "Product fetched successfully",
        ProductPayload { product },
    ))
}

#[instrument(skip(state, upload))]
pub async fn create_product(
    State(state): State<AppState>,
    mut upload: Uploaded<ProductImage>,
) -> Result<ApiResponse, AppError> {
    let result = match upload.validate_form(ProductRequest::from_form) {
        Ok(fields) => services::create(&state, fields).await,
        Err(e) => Err(e),
    };
    let product = upload.settle(result).await?;
    Ok(ApiResponse::ok(
        "Product created successfully",
        ProductPayload { product },
    ))
}

#[instrument(skip(state, upload))]
pub async fn update_product(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    mut upload: Uploaded<ProductImage>,
) -> Result<ApiResponse, AppError> {
    let result = match upload.validate_form(ProductRequest::from_form) {
        Ok(fields) => services::update(&state, id, fields).await,
        Err(e) => Err(e),
    };
    let affected_rows = upload.settle(result).await?;
    Ok(ApiResponse::ok(
        "Product updated successfully",
        AffectedRows { affected_rows },
    ))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<ApiResponse, AppError> {
    let affected_rows = services::delete(&state, id).await?;
    Ok(ApiResponse::ok(
        "Product deleted successfully",
        AffectedRows { affected_rows },
    ))
}
