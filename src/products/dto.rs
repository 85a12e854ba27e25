use rust_decimal::Decimal;
use serde::Serialize;

use super::repo_types::{Product, ProductFields};
use crate::{
    upload::FormFields,
    validation::{FieldErrors, Validate, Validator},
};

/// NUMERIC(10, 2) tops out at 99,999,999.99.
fn price_ceiling() -> Decimal {
    Decimal::new(100_000_000, 0)
}

/// Multipart product form. `image` holds the stored path when a file was uploaded.
#[derive(Debug, Default)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub category_id: Option<String>,
    pub image: Option<String>,
}

impl ProductRequest {
    pub fn from_form(mut form: FormFields) -> Self {
        Self {
            name: form.take("name"),
            description: form.take("description"),
            price: form.take("price"),
            stock: form.take("stock"),
            category_id: form.take("category_id"),
            image: form.take("image"),
        }
    }
}

impl Validate for ProductRequest {
    type Valid = ProductFields;

    fn validate(self) -> Result<ProductFields, FieldErrors> {
        let mut v = Validator::default();

        let name = v
            .field("name", self.name)
            .required("Name is required")
            .max_len(255, "Name must be at most 255 characters")
            .value();
        let description = v.field("description", self.description).value();

        let price = v
            .field("price", self.price)
            .required("Price is required")
            .parse::<Decimal>("Price must be a number");
        if let Some(p) = price {
            if p < Decimal::ZERO {
                v.error("price", "Price must be at least 0");
            } else if p.normalize().scale() > 2 {
                v.error("price", "Price must have at most 2 decimal places");
            } else if p >= price_ceiling() {
                v.error("price", "Price is too large");
            }
        }

        let stock = v
            .field("stock", self.stock)
            .parse::<i32>("Stock must be an integer");
        if stock.is_some_and(|s| s < 0) {
            v.error("stock", "Stock must be at least 0");
        }

        let category_id = v
            .field("category_id", self.category_id)
            .parse::<i64>("Category id must be an integer");
        if category_id.is_some_and(|id| id <= 0) {
            v.error("category_id", "Category id must be a positive integer");
        }

        let image = v.field("image", self.image).value();

        v.finish(|| ProductFields {
            name: name.unwrap_or_default(),
            description,
            price: price.unwrap_or_default(),
            stock: stock.unwrap_or(0),
            image,
            category_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductPayload {
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}
