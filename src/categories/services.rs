use tracing::info;

use super::repo_types::{Category, CategoryFields};
use crate::{error::AppError, state::AppState};

pub async fn list(state: &AppState) -> Result<Vec<Category>, AppError> {
    state
        .categories
        .list()
        .await
        .map_err(AppError::internal("Failed to fetch categories"))
}

pub async fn get(state: &AppState, id: i64) -> Result<Category, AppError> {
    state
        .categories
        .find(id)
        .await
        .map_err(AppError::internal("Failed to fetch category"))?
        .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

pub async fn create(state: &AppState, fields: CategoryFields) -> Result<Category, AppError> {
    let category = state
        .categories
        .create(fields)
        .await
        .map_err(AppError::creation("category"))?;
    info!(category_id = category.id, "category created");
    Ok(category)
}

pub async fn update(state: &AppState, id: i64, fields: CategoryFields) -> Result<u64, AppError> {
    let affected = state
        .categories
        .update(id, fields)
        .await
        .map_err(AppError::internal("Failed to update category"))?;
    info!(category_id = id, affected, "category updated");
    Ok(affected)
}

pub async fn delete(state: &AppState, id: i64) -> Result<u64, AppError> {
    let affected = state
        .categories
        .delete(id)
        .await
        .map_err(AppError::internal("Failed to delete category"))?;
    info!(category_id = id, affected, "category deleted");
    Ok(affected)
}
