use actix_identity::Identity;
use actix_web::{
    delete, get, post, put,
    web::{self, Data},
    HttpMessage, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::filter::PropertyFilter;
use crate::store::Store;
use crate::structs::{
    AppointmentPatch, InsertAppointment, InsertProperty, InsertUser, PropertyPatch, User,
    APPOINTMENT_STATUSES,
};
use crate::utils;
use crate::AppState;

/// Resolves the session identity to a stored user. Everything that can go
/// wrong short of an identity-layer failure maps to 401.
fn current_user(identity: Option<Identity>, store: &Store) -> Result<User, AppError> {
    let identity = identity
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_owned()))?;
    let id = identity.id()?;
    let user_id: i64 = id
        .parse()
        .map_err(|_| AppError::Unauthorized("Authentication required".to_owned()))?;
    store
        .get_user(user_id)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_owned()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

#[post("/api/auth/register")]
pub async fn register_handler(
    payload: web::Json<RegisterRequest>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let payload = payload.into_inner();

    // validate the payload before touching the store
    if payload.username.trim().is_empty()
        || payload.password.is_empty()
        || payload.email.trim().is_empty()
        || payload.full_name.trim().is_empty()
    {
        return Err(AppError::Validation("All fields are required".to_owned()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_owned()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_owned(),
        ));
    }
    if payload.password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_owned(),
        ));
    }

    let lc_email = payload.email.to_lowercase();

    if state.store.get_user_by_username(&payload.username).is_some() {
        return Err(AppError::Conflict("Username already exists".to_owned()));
    }
    if state.store.get_user_by_email(&lc_email).is_some() {
        return Err(AppError::Conflict("Email already exists".to_owned()));
    }

    let user = state.store.create_user(InsertUser {
        username: payload.username,
        password: payload.password,
        email: lc_email,
        full_name: payload.full_name,
    })?;

    Identity::login(&request.extensions(), user.id.to_string())?;

    Ok(HttpResponse::Created().json(user.public()))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[post("/api/auth/login")]
pub async fn login_handler(
    payload: web::Json<LoginRequest>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    match state.store.get_user_by_username(&payload.username) {
        Some(user) if utils::verify_password(&payload.password, &user.password) => {
            Identity::login(&request.extensions(), user.id.to_string())?;
            Ok(HttpResponse::Ok().json(user.public()))
        }
        Some(_) | None => {
            log::warn!("Failed login attempt for username: {}", payload.username);
            Err(AppError::Unauthorized("Invalid credentials".to_owned()))
        }
    }
}

#[post("/api/auth/logout")]
pub async fn logout_handler(identity: Identity) -> impl Responder {
    identity.logout();
    HttpResponse::Ok().json(serde_json::json!({ "message": "Logged out successfully" }))
}

#[get("/api/auth/me")]
pub async fn me_handler(
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)
        .map_err(|_| AppError::Unauthorized("Not authenticated".to_owned()))?;
    Ok(HttpResponse::Ok().json(user.public()))
}

/// Post-query options applied to the filtered list.
#[derive(Deserialize, Debug, Default)]
pub struct ListOptions {
    pub sort: Option<String>,
    pub search: Option<String>,
}

#[get("/api/properties")]
pub async fn properties_handler(
    filter: web::Query<PropertyFilter>,
    options: web::Query<ListOptions>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let compiled = filter.compile();
    let mut properties = state.store.get_properties(&compiled);

    if let Some(query) = &options.search {
        properties = utils::search_properties(properties, query);
    }
    if let Some(sort_key) = &options.sort {
        properties = utils::sort_properties(properties, sort_key);
    }

    Ok(HttpResponse::Ok().json(properties))
}

#[get("/api/properties/featured")]
pub async fn featured_properties_handler(
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.store.get_featured_properties()))
}

#[get("/api/properties/{id}")]
pub async fn property_handler(
    path: web::Path<i64>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let property = state
        .store
        .get_property(path.into_inner())
        .ok_or(AppError::NotFound("Property"))?;
    Ok(HttpResponse::Ok().json(property))
}

#[post("/api/properties")]
pub async fn create_property_handler(
    payload: web::Json<InsertProperty>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let payload = payload.into_inner();

    if payload.title.trim().is_empty() || payload.price.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and price are required".to_owned(),
        ));
    }
    if payload.listing_type != "buy" && payload.listing_type != "rent" {
        return Err(AppError::Validation(
            "Listing type must be buy or rent".to_owned(),
        ));
    }

    // the owner is always the session user, never the payload
    let property = state.store.create_property(payload, user.id);
    Ok(HttpResponse::Created().json(property))
}

#[put("/api/properties/{id}")]
pub async fn update_property_handler(
    path: web::Path<i64>,
    payload: web::Json<PropertyPatch>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let id = path.into_inner();

    let property = state
        .store
        .get_property(id)
        .ok_or(AppError::NotFound("Property"))?;
    if property.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to update this property".to_owned(),
        ));
    }

    let updated = state
        .store
        .update_property(id, payload.into_inner())
        .ok_or(AppError::NotFound("Property"))?;
    Ok(HttpResponse::Ok().json(updated))
}

#[delete("/api/properties/{id}")]
pub async fn delete_property_handler(
    path: web::Path<i64>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let id = path.into_inner();

    let property = state
        .store
        .get_property(id)
        .ok_or(AppError::NotFound("Property"))?;
    if property.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this property".to_owned(),
        ));
    }

    state.store.delete_property(id);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Property deleted successfully"
    })))
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub rating: Option<f64>,
}

#[post("/api/properties/{id}/rate")]
pub async fn rate_property_handler(
    path: web::Path<i64>,
    payload: web::Json<RateRequest>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let rating = payload.rating.ok_or_else(|| {
        AppError::Validation("Invalid rating. Must be between 1 and 5.".to_owned())
    })?;
    let property = state.store.rate_property(path.into_inner(), rating)?;
    Ok(HttpResponse::Ok().json(property))
}

#[get("/api/appointments")]
pub async fn appointments_handler(
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    Ok(HttpResponse::Ok().json(state.store.get_appointments_by_user(user.id)))
}

#[post("/api/appointments")]
pub async fn create_appointment_handler(
    payload: web::Json<InsertAppointment>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let payload = payload.into_inner();

    if !APPOINTMENT_STATUSES.contains(&payload.status.as_str()) {
        return Err(AppError::Validation(
            "Status must be pending, confirmed or cancelled".to_owned(),
        ));
    }
    // viewings can only be requested against an existing listing
    if state.store.get_property(payload.property_id).is_none() {
        return Err(AppError::NotFound("Property"));
    }

    let appointment = state.store.create_appointment(payload, user.id);
    Ok(HttpResponse::Created().json(appointment))
}

#[put("/api/appointments/{id}")]
pub async fn update_appointment_handler(
    path: web::Path<i64>,
    payload: web::Json<AppointmentPatch>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let id = path.into_inner();
    let payload = payload.into_inner();

    if let Some(status) = &payload.status {
        if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
            return Err(AppError::Validation(
                "Status must be pending, confirmed or cancelled".to_owned(),
            ));
        }
    }

    let appointment = state
        .store
        .get_appointment(id)
        .ok_or(AppError::NotFound("Appointment"))?;
    if appointment.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to update this appointment".to_owned(),
        ));
    }

    let updated = state
        .store
        .update_appointment(id, payload)
        .ok_or(AppError::NotFound("Appointment"))?;
    Ok(HttpResponse::Ok().json(updated))
}

#[post("/api/saved-properties/{id}")]
pub async fn save_property_handler(
    path: web::Path<i64>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;
    let property_id = path.into_inner();

    if state.store.get_property(property_id).is_none() {
        return Err(AppError::NotFound("Property"));
    }

    let updated = state
        .store
        .update_user_saved_properties(user.id, property_id, true)
        .ok_or(AppError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(updated.public()))
}

#[delete("/api/saved-properties/{id}")]
pub async fn unsave_property_handler(
    path: web::Path<i64>,
    identity: Option<Identity>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = current_user(identity, &state.store)?;

    let updated = state
        .store
        .update_user_saved_properties(user.id, path.into_inner(), false)
        .ok_or(AppError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(updated.public()))
}

#[get("/api/agents")]
pub async fn agents_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.store.get_agents()))
}

#[get("/api/agents/{id}")]
pub async fn agent_handler(
    path: web::Path<i64>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let agent = state
        .store
        .get_agent(path.into_inner())
        .ok_or(AppError::NotFound("Agent"))?;
    Ok(HttpResponse::Ok().json(agent))
}
