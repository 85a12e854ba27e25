use serde::{Deserialize, Serialize};

use super::repo_types::{Category, CategoryFields};
use crate::validation::{FieldErrors, Validate, Validator};

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for CategoryRequest {
    type Valid = CategoryFields;

    fn validate(self) -> Result<CategoryFields, FieldErrors> {
        let mut v = Validator::default();
        let name = v
            .field("name", self.name)
            .required("Name is required")
            .max_len(255, "Name must be at most 255 characters")
            .value();
        let description = v.field("description", self.description).value();
        v.finish(|| CategoryFields {
            name: name.unwrap_or_default(),
            description,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryPayload {
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}
