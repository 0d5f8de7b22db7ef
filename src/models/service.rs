use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE_DURATION: i64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "Service_ID")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Category")]
    pub category: Option<String>,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Duration")]
    pub duration_minutes: i64,
    #[serde(rename = "Is_Available")]
    pub is_available: bool,
    #[serde(rename = "Created_At")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSummary {
    #[serde(rename = "Service_ID")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Category")]
    pub category: Option<String>,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Duration")]
    pub duration_minutes: i64,
}

impl From<Service> for ServiceSummary {
    fn from(s: Service) -> Self {
        Self {
            id: s.id,
            name: s.name,
            category: s.category,
            price: s.price,
            duration_minutes: s.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Duration", default)]
    pub duration_minutes: Option<i64>,
    #[serde(rename = "Is_Available", default)]
    pub is_available: Option<bool>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceUpdate {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "Price", default)]
    pub price: Option<f64>,
    #[serde(rename = "Duration", default)]
    pub duration_minutes: Option<i64>,
    #[serde(rename = "Is_Available", default)]
    pub is_available: Option<bool>,
}
