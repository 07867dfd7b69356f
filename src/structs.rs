use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 hash, never sent over the wire. Responses use [`PublicUser`].
    pub password: String,
    pub email: String,
    pub full_name: String,
    /// JSON-encoded list of saved property ids, e.g. `"[3,7]"`.
    pub saved_properties: String,
    pub created_at: DateTime<Utc>,
}

/// Response view of a [`User`] with the credential stripped.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub saved_properties: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            saved_properties: self.saved_properties.clone(),
            created_at: self.created_at,
        }
    }

    /// Decodes the saved-properties list. Malformed stored data degrades to
    /// an empty list instead of failing the surrounding operation.
    pub fn saved_property_ids(&self) -> Vec<i64> {
        serde_json::from_str(&self.saved_properties).unwrap_or_default()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsertUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Decimal carried as text to avoid precision loss in transit.
    pub price: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub lat: String,
    pub lng: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub square_feet: i32,
    pub year_built: Option<i32>,
    pub property_type: String,
    /// "buy" or "rent".
    pub listing_type: String,
    pub image_url: String,
    pub user_id: i64,
    pub featured: bool,
    pub status: String,
    pub avg_rating: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn price_value(&self) -> Option<f64> {
        self.price.trim().parse().ok()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsertProperty {
    pub title: String,
    pub description: String,
    pub price: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub lat: String,
    pub lng: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub square_feet: i32,
    #[serde(default)]
    pub year_built: Option<i32>,
    pub property_type: String,
    pub listing_type: String,
    pub image_url: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_property_status")]
    pub status: String,
}

fn default_property_status() -> String {
    "available".to_owned()
}

/// Partial update for a property. Identifier, owner, rating tallies and the
/// creation timestamp are not patchable.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub square_feet: Option<i32>,
    pub year_built: Option<i32>,
    pub property_type: Option<String>,
    pub listing_type: Option<String>,
    pub image_url: Option<String>,
    pub featured: Option<bool>,
    pub status: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub property_id: i64,
    pub user_id: i64,
    pub date: DateTime<Utc>,
    pub message: Option<String>,
    /// "pending", "confirmed" or "cancelled".
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsertAppointment {
    pub property_id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_appointment_status")]
    pub status: String,
}

fn default_appointment_status() -> String {
    "pending".to_owned()
}

pub const APPOINTMENT_STATUSES: [&str; 3] = ["pending", "confirmed", "cancelled"];

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub specialization: String,
    pub rating: f64,
    pub properties_sold: i32,
    pub image_url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsertAgent {
    pub name: String,
    pub specialization: String,
    pub rating: f64,
    pub properties_sold: i32,
    pub image_url: String,
}
