use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// bcrypt hash; `None` until the account is activated.
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// What the API exposes about an admin; never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
    pub admin_id: i64,
    pub email: String,
    pub name: String,
    pub is_active: bool,
}

impl From<&Admin> for AdminSummary {
    fn from(a: &Admin) -> Self {
        Self {
            admin_id: a.id,
            email: a.email.clone(),
            name: a.name.clone(),
            is_active: a.is_active,
        }
    }
}
