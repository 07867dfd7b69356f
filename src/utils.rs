use std::cmp::Ordering;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::structs::Property;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Checks a provided password against a stored Argon2 hash. A hash that does
/// not parse counts as a failed verification, not an error.
pub fn verify_password(provided: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(provided.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn price_or_zero(property: &Property) -> f64 {
    property.price_value().unwrap_or(0.0)
}

fn cmp_price(a: &Property, b: &Property) -> Ordering {
    price_or_zero(a)
        .partial_cmp(&price_or_zero(b))
        .unwrap_or(Ordering::Equal)
}

/// Reorders an already-fetched list. All sorts are stable: entries with equal
/// keys keep their original relative order. An unrecognized key returns the
/// input unchanged.
pub fn sort_properties(mut properties: Vec<Property>, sort_key: &str) -> Vec<Property> {
    match sort_key {
        "price_low" => properties.sort_by(cmp_price),
        "price_high" => properties.sort_by(|a, b| cmp_price(b, a)),
        "newest" => properties.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        "oldest" => properties.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        "beds_high" => properties.sort_by(|a, b| b.bedrooms.cmp(&a.bedrooms)),
        "beds_low" => properties.sort_by(|a, b| a.bedrooms.cmp(&b.bedrooms)),
        "baths_high" => properties.sort_by(|a, b| b.bathrooms.cmp(&a.bathrooms)),
        "baths_low" => properties.sort_by(|a, b| a.bathrooms.cmp(&b.bathrooms)),
        "sqft_high" => properties.sort_by(|a, b| b.square_feet.cmp(&a.square_feet)),
        "sqft_low" => properties.sort_by(|a, b| a.square_feet.cmp(&b.square_feet)),
        _ => {}
    }
    properties
}

/// Free-text search over title, description, address, city, state, zip code
/// and property type. A property matches when any field contains the trimmed,
/// lower-cased query. An empty or whitespace-only query returns the input
/// unchanged.
pub fn search_properties(properties: Vec<Property>, query: &str) -> Vec<Property> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return properties;
    }

    properties
        .into_iter()
        .filter(|p| {
            p.title.to_lowercase().contains(&query)
                || p.description.to_lowercase().contains(&query)
                || p.address.to_lowercase().contains(&query)
                || p.city.to_lowercase().contains(&query)
                || p.state.to_lowercase().contains(&query)
                || p.zip_code.to_lowercase().contains(&query)
                || p.property_type.to_lowercase().contains(&query)
        })
        .collect()
}

/// Partitions a list by the string form of a chosen field. Groups appear in
/// the order their key is first seen and entries keep their order within each
/// group.
pub fn group_properties<F>(properties: Vec<Property>, key: F) -> Vec<(String, Vec<Property>)>
where
    F: Fn(&Property) -> String,
{
    let mut groups: Vec<(String, Vec<Property>)> = Vec::new();
    for property in properties {
        let group_key = key(&property);
        match groups.iter_mut().find(|(k, _)| *k == group_key) {
            Some((_, members)) => members.push(property),
            None => groups.push((group_key, vec![property])),
        }
    }
    groups
}
