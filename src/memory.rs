//! In-process implementations of the repositories and the mailer. They back
//! `AppState::fake()` and the integration tests, and mirror the constraints the
//! Postgres schema enforces (unique email, product category FK with SET NULL).

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    auth::{
        repo::UserRepository,
        repo_types::{NewUser, ProfileChanges, User, UserFilter},
    },
    categories::{
        repo::CategoryRepository,
        repo_types::{Category, CategoryFields},
    },
    db::{StoreError, StoreResult},
    mail::{Mailer, OutgoingMail},
    products::{
        repo::ProductRepository,
        repo_types::{Product, ProductFields},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    next_user: i64,
    next_category: i64,
    next_product: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking test must not wedge every other caller.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn email_taken(t: &Tables, email: &str, except: Option<i64>) -> bool {
    t.users
        .iter()
        .any(|u| u.email == email && Some(u.id) != except)
}

fn check_category(t: &Tables, category_id: Option<i64>) -> StoreResult<()> {
    match category_id {
        Some(id) if !t.categories.iter().any(|c| c.id == id) => Err(
            StoreError::ForeignKeyViolation("products_category_id_fkey".into()),
        ),
        _ => Ok(()),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let t = self.lock();
        Ok(t.users
            .iter()
            .find(|u| match filter {
                UserFilter::Id(id) => u.id == *id,
                UserFilter::Email(email) => u.email == *email,
            })
            .cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.lock();
        if email_taken(&t, &user.email, None) {
            return Err(StoreError::UniqueViolation("users_email_unique".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: next_id(&mut t.next_user),
            name: Some(user.name),
            email: user.email,
            password: user.password_hash,
            mobile: Some(user.mobile),
            gender: Some(user.gender),
            profile_picture: user.profile_picture,
            email_verified: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> StoreResult<u64> {
        let mut t = self.lock();
        if email_taken(&t, &changes.email, Some(id)) {
            return Err(StoreError::UniqueViolation("users_email_unique".into()));
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(0);
        };
        user.name = Some(changes.name);
        user.email = changes.email;
        user.mobile = Some(changes.mobile);
        user.gender = Some(changes.gender);
        if let Some(picture) = changes.profile_picture {
            user.profile_picture = Some(picture);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(1)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<u64> {
        let mut t = self.lock();
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(0);
        };
        user.password = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(1)
    }

    async fn mark_email_verified(&self, id: i64, at: OffsetDateTime) -> StoreResult<u64> {
        let mut t = self.lock();
        match t
            .users
            .iter_mut()
            .find(|u| u.id == id && u.email_verified.is_none())
        {
            Some(user) => {
                user.email_verified = Some(at);
                user.updated_at = at;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Category>> {
        Ok(self.lock().categories.clone())
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Category>> {
        Ok(self.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, fields: CategoryFields) -> StoreResult<Category> {
        let mut t = self.lock();
        let now = OffsetDateTime::now_utc();
        let row = Category {
            id: next_id(&mut t.next_category),
            name: fields.name,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        t.categories.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, fields: CategoryFields) -> StoreResult<u64> {
        let mut t = self.lock();
        let Some(row) = t.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(0);
        };
        row.name = fields.name;
        row.description = fields.description;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(1)
    }

    async fn delete(&self, id: i64) -> StoreResult<u64> {
        let mut t = self.lock();
        let before = t.categories.len();
        t.categories.retain(|c| c.id != id);
        if t.categories.len() == before {
            return Ok(0);
        }
        for product in t.products.iter_mut().filter(|p| p.category_id == Some(id)) {
            product.category_id = None;
        }
        Ok(1)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Product>> {
        Ok(self.lock().products.clone())
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, fields: ProductFields) -> StoreResult<Product> {
        let mut t = self.lock();
        check_category(&t, fields.category_id)?;
        let now = OffsetDateTime::now_utc();
        let row = Product {
            id: next_id(&mut t.next_product),
            name: fields.name,
            description: fields.description,
            price: fields.price,
            stock: fields.stock,
            image: fields.image,
            category_id: fields.category_id,
            created_at: now,
            updated_at: now,
        };
        t.products.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, fields: ProductFields) -> StoreResult<u64> {
        let mut t = self.lock();
        if !t.products.iter().any(|p| p.id == id) {
            return Ok(0);
        }
        check_category(&t, fields.category_id)?;
        let Some(row) = t.products.iter_mut().find(|p| p.id == id) else {
            return Ok(0);
        };
        row.name = fields.name;
        row.description = fields.description;
        row.price = fields.price;
        row.stock = fields.stock;
        if let Some(image) = fields.image {
            row.image = Some(image);
        }
        row.category_id = fields.category_id;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(1)
    }

    async fn delete(&self, id: i64) -> StoreResult<u64> {
        let mut t = self.lock();
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        Ok((before - t.products.len()) as u64)
    }
}

/// Keeps every message it is asked to send. `failing()` rejects them all.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("mail transport unavailable");
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(mail);
        Ok(())
    }
}
