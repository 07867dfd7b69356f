use std::str::FromStr;

use serde::Deserialize;

use crate::structs::Property;

/// Raw filter as it arrives on the query string. Every field is optional and
/// numeric bounds are strings; see [`PropertyFilter::compile`] for how they
/// become typed constraints.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilter {
    pub city: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_beds: Option<String>,
    pub min_baths: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<String>,
    pub min_sqft: Option<String>,
    pub max_sqft: Option<String>,
    pub min_year: Option<String>,
    pub max_year: Option<String>,
}

/// Typed form of [`PropertyFilter`], parsed exactly once before the query
/// engine runs. A bound that is absent, empty or unparsable is `None`, which
/// means "no constraint" rather than a query error.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    city: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_beds: Option<i32>,
    min_baths: Option<i32>,
    property_type: Option<String>,
    listing_type: Option<String>,
    min_sqft: Option<i32>,
    max_sqft: Option<i32>,
    min_year: Option<i32>,
    max_year: Option<i32>,
}

fn parse_bound<T: FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

fn non_empty(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl PropertyFilter {
    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter {
            city: non_empty(&self.city).map(|c| c.to_lowercase()),
            min_price: parse_bound(&self.min_price),
            max_price: parse_bound(&self.max_price),
            min_beds: parse_bound(&self.min_beds),
            min_baths: parse_bound(&self.min_baths),
            // "Any" is the UI's wildcard, not a real property type
            property_type: non_empty(&self.property_type).filter(|t| t != "Any"),
            listing_type: non_empty(&self.listing_type),
            min_sqft: parse_bound(&self.min_sqft),
            max_sqft: parse_bound(&self.max_sqft),
            min_year: parse_bound(&self.min_year),
            max_year: parse_bound(&self.max_year),
        }
    }
}

impl CompiledFilter {
    /// True when the property satisfies every provided predicate.
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(city) = &self.city {
            if !property.city.to_lowercase().contains(city.as_str()) {
                return false;
            }
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            // a price that does not parse can never satisfy a price bound
            let Some(price) = property.price_value() else {
                return false;
            };
            if self.min_price.is_some_and(|min| price < min) {
                return false;
            }
            if self.max_price.is_some_and(|max| price > max) {
                return false;
            }
        }

        if self.min_beds.is_some_and(|min| property.bedrooms < min) {
            return false;
        }
        if self.min_baths.is_some_and(|min| property.bathrooms < min) {
            return false;
        }

        if let Some(property_type) = &self.property_type {
            if property.property_type != *property_type {
                return false;
            }
        }
        if let Some(listing_type) = &self.listing_type {
            if property.listing_type != *listing_type {
                return false;
            }
        }

        if self.min_sqft.is_some_and(|min| property.square_feet < min) {
            return false;
        }
        if self.max_sqft.is_some_and(|max| property.square_feet > max) {
            return false;
        }

        if self.min_year.is_some() || self.max_year.is_some() {
            // properties with no build year are excluded by either bound
            let Some(year) = property.year_built else {
                return false;
            };
            if self.min_year.is_some_and(|min| year < min) {
                return false;
            }
            if self.max_year.is_some_and(|max| year > max) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn property() -> Property {
        Property {
            id: 1,
            title: "Sunny Craftsman".to_owned(),
            description: "Restored craftsman with a big porch".to_owned(),
            price: "500000".to_owned(),
            address: "100 Maple Ave".to_owned(),
            city: "Los Angeles".to_owned(),
            state: "CA".to_owned(),
            zip_code: "90001".to_owned(),
            lat: "34.05".to_owned(),
            lng: "-118.24".to_owned(),
            bedrooms: 3,
            bathrooms: 2,
            square_feet: 1800,
            year_built: Some(1972),
            property_type: "House".to_owned(),
            listing_type: "buy".to_owned(),
            image_url: "/house.jpg".to_owned(),
            user_id: 1,
            featured: false,
            status: "available".to_owned(),
            avg_rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        }
    }

    fn filter(fields: &[(&str, &str)]) -> PropertyFilter {
        let map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), serde_json::Value::String((*v).to_owned())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn city_match_is_case_insensitive_substring() {
        let compiled = filter(&[("city", "los")]).compile();
        assert!(compiled.matches(&property()));

        let compiled = filter(&[("city", "ANGEL")]).compile();
        assert!(compiled.matches(&property()));

        let compiled = filter(&[("city", "austin")]).compile();
        assert!(!compiled.matches(&property()));
    }

    #[test]
    fn unparsable_bounds_are_skipped() {
        let compiled = filter(&[
            ("minPrice", "cheap"),
            ("maxSqft", "12x"),
            ("minYear", ""),
        ])
        .compile();
        assert!(compiled.matches(&property()));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let compiled = filter(&[("minPrice", "500000"), ("maxPrice", "500000")]).compile();
        assert!(compiled.matches(&property()));

        let compiled = filter(&[("minPrice", "500001")]).compile();
        assert!(!compiled.matches(&property()));
    }

    #[test]
    fn unparsable_property_price_never_meets_a_bound() {
        let mut subject = property();
        subject.price = "call for pricing".to_owned();
        let compiled = filter(&[("maxPrice", "900000")]).compile();
        assert!(!compiled.matches(&subject));
    }

    #[test]
    fn any_property_type_means_no_constraint() {
        let compiled = filter(&[("propertyType", "Any")]).compile();
        assert!(compiled.matches(&property()));

        let compiled = filter(&[("propertyType", "Condo")]).compile();
        assert!(!compiled.matches(&property()));
    }

    #[test]
    fn missing_year_built_fails_either_year_bound() {
        let mut subject = property();
        subject.year_built = None;

        assert!(!filter(&[("minYear", "1950")]).compile().matches(&subject));
        assert!(!filter(&[("maxYear", "2030")]).compile().matches(&subject));
        assert!(filter(&[]).compile().matches(&subject));
    }
}
