use tracing::{info, warn};

use super::repo_types::{Product, ProductFields};
use crate::{db::StoreError, error::AppError, state::AppState};

fn unknown_category(e: StoreError) -> Result<AppError, StoreError> {
    match e {
        StoreError::ForeignKeyViolation(constraint) => {
            warn!(%constraint, "product references a missing category");
            Ok(AppError::field("category_id", "Category does not exist"))
        }
        other => Err(other),
    }
}

pub async fn list(state: &AppState) -> Result<Vec<Product>, AppError> {
    state
        .products
        .list()
        .await
        .map_err(AppError::internal("Failed to fetch products"))
}

pub async fn get(state: &AppState, id: i64) -> Result<Product, AppError> {
    state
        .products
        .find(id)
        .await
        .map_err(AppError::internal("Failed to fetch product"))?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

pub async fn create(state: &AppState, fields: ProductFields) -> Result<Product, AppError> {
    let product = state
        .products
        .create(fields)
        .await
        .map_err(|e| unknown_category(e).unwrap_or_else(AppError::creation("product")))?;
    info!(product_id = product.id, "product created");
    Ok(product)
}

pub async fn update(state: &AppState, id: i64, fields: ProductFields) -> Result<u64, AppError> {
    let affected = state
        .products
        .update(id, fields)
        .await
        .map_err(|e| {
            unknown_category(e).unwrap_or_else(AppError::internal("Failed to update product"))
        })?;
    info!(product_id = id, affected, "product updated");
    Ok(affected)
}

pub async fn delete(state: &AppState, id: i64) -> Result<u64, AppError> {
    let affected = state
        .products
        .delete(id)
        .await
        .map_err(AppError::internal("Failed to delete product"))?;
    info!(product_id = id, affected, "product deleted");
    Ok(affected)
}
