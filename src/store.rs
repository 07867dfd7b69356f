use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::errors::AppError;
use crate::filter::CompiledFilter;
use crate::structs::{
    Agent, Appointment, AppointmentPatch, InsertAgent, InsertAppointment, InsertProperty,
    InsertUser, Property, PropertyPatch, User,
};
use crate::utils;

/// One entity collection: rows keyed by id plus the id counter. Counters
/// start at 1 and only ever move forward, so id order equals insertion order.
#[derive(Debug)]
struct Table<T> {
    rows: HashMap<i64, T>,
    next_id: i64,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Table {
            rows: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// All rows in storage (id) order. `HashMap` iteration order is
    /// unspecified, so this materializes through a sorted id list.
    fn all(&self) -> Vec<T> {
        let mut ids: Vec<i64> = self.rows.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.rows.get(&id).cloned())
            .collect()
    }
}

/// In-memory entity store. Constructed once at startup and handed to request
/// handlers through app data; each operation takes a single collection lock
/// for its duration, so individual operations are atomic.
#[derive(Debug)]
pub struct Store {
    users: RwLock<Table<User>>,
    properties: RwLock<Table<Property>>,
    appointments: RwLock<Table<Appointment>>,
    agents: RwLock<Table<Agent>>,
}

impl Store {
    pub fn new() -> Self {
        let store = Store {
            users: RwLock::new(Table::new()),
            properties: RwLock::new(Table::new()),
            appointments: RwLock::new(Table::new()),
            agents: RwLock::new(Table::new()),
        };
        store.seed_agents();
        store
    }

    // User operations

    pub fn get_user(&self, id: i64) -> Option<User> {
        self.users.read().unwrap().rows.get(&id).cloned()
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap()
            .rows
            .values()
            .find(|user| user.username == username)
            .cloned()
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap()
            .rows
            .values()
            .find(|user| user.email == email)
            .cloned()
    }

    pub fn create_user(&self, insert: InsertUser) -> Result<User, AppError> {
        let password = utils::hash_password(&insert.password).map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            AppError::Password(e.to_string())
        })?;

        let mut users = self.users.write().unwrap();
        let id = users.allocate_id();
        let user = User {
            id,
            username: insert.username,
            password,
            email: insert.email,
            full_name: insert.full_name,
            saved_properties: "[]".to_owned(),
            created_at: Utc::now(),
        };
        users.rows.insert(id, user.clone());
        log::info!("User created: id={} username={}", user.id, user.username);
        Ok(user)
    }

    /// Adds or removes a property id from the user's favorites. Adding an id
    /// that is already saved and removing one that is not are both no-ops.
    pub fn update_user_saved_properties(
        &self,
        user_id: i64,
        property_id: i64,
        add: bool,
    ) -> Option<User> {
        let mut users = self.users.write().unwrap();
        let user = users.rows.get_mut(&user_id)?;

        let mut saved = user.saved_property_ids();
        if add {
            if !saved.contains(&property_id) {
                saved.push(property_id);
            }
        } else {
            saved.retain(|id| *id != property_id);
        }
        user.saved_properties =
            serde_json::to_string(&saved).unwrap_or_else(|_| "[]".to_owned());

        Some(user.clone())
    }

    // Property operations

    pub fn get_property(&self, id: i64) -> Option<Property> {
        self.properties.read().unwrap().rows.get(&id).cloned()
    }

    /// The query engine: returns every property satisfying all of the
    /// compiled filter's predicates, in storage order.
    pub fn get_properties(&self, filter: &CompiledFilter) -> Vec<Property> {
        self.properties
            .read()
            .unwrap()
            .all()
            .into_iter()
            .filter(|property| filter.matches(property))
            .collect()
    }

    pub fn get_featured_properties(&self) -> Vec<Property> {
        self.properties
            .read()
            .unwrap()
            .all()
            .into_iter()
            .filter(|property| property.featured)
            .collect()
    }

    pub fn create_property(&self, insert: InsertProperty, user_id: i64) -> Property {
        let mut properties = self.properties.write().unwrap();
        let id = properties.allocate_id();
        let property = Property {
            id,
            title: insert.title,
            description: insert.description,
            price: insert.price,
            address: insert.address,
            city: insert.city,
            state: insert.state,
            zip_code: insert.zip_code,
            lat: insert.lat,
            lng: insert.lng,
            bedrooms: insert.bedrooms,
            bathrooms: insert.bathrooms,
            square_feet: insert.square_feet,
            year_built: insert.year_built,
            property_type: insert.property_type,
            listing_type: insert.listing_type,
            image_url: insert.image_url,
            user_id,
            featured: insert.featured,
            status: insert.status,
            avg_rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        };
        properties.rows.insert(id, property.clone());
        log::info!("Property created: id={} city={}", property.id, property.city);
        property
    }

    pub fn update_property(&self, id: i64, patch: PropertyPatch) -> Option<Property> {
        let mut properties = self.properties.write().unwrap();
        let property = properties.rows.get_mut(&id)?;

        if let Some(title) = patch.title {
            property.title = title;
        }
        if let Some(description) = patch.description {
            property.description = description;
        }
        if let Some(price) = patch.price {
            property.price = price;
        }
        if let Some(address) = patch.address {
            property.address = address;
        }
        if let Some(city) = patch.city {
            property.city = city;
        }
        if let Some(state) = patch.state {
            property.state = state;
        }
        if let Some(zip_code) = patch.zip_code {
            property.zip_code = zip_code;
        }
        if let Some(lat) = patch.lat {
            property.lat = lat;
        }
        if let Some(lng) = patch.lng {
            property.lng = lng;
        }
        if let Some(bedrooms) = patch.bedrooms {
            property.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = patch.bathrooms {
            property.bathrooms = bathrooms;
        }
        if let Some(square_feet) = patch.square_feet {
            property.square_feet = square_feet;
        }
        if let Some(year_built) = patch.year_built {
            property.year_built = Some(year_built);
        }
        if let Some(property_type) = patch.property_type {
            property.property_type = property_type;
        }
        if let Some(listing_type) = patch.listing_type {
            property.listing_type = listing_type;
        }
        if let Some(image_url) = patch.image_url {
            property.image_url = image_url;
        }
        if let Some(featured) = patch.featured {
            property.featured = featured;
        }
        if let Some(status) = patch.status {
            property.status = status;
        }

        log::info!("Property updated: id={}", id);
        Some(property.clone())
    }

    pub fn delete_property(&self, id: i64) -> bool {
        let removed = self.properties.write().unwrap().rows.remove(&id).is_some();
        if removed {
            log::info!("Property deleted: id={}", id);
        }
        removed
    }

    /// Folds a new rating into the property's running average. The whole
    /// read-modify-write happens under the collection's write lock, so
    /// concurrent submissions serialize and the mean stays exact.
    pub fn rate_property(&self, id: i64, rating: f64) -> Result<Property, AppError> {
        if !(1.0..=5.0).contains(&rating) {
            return Err(AppError::Validation(
                "Invalid rating. Must be between 1 and 5.".to_owned(),
            ));
        }

        let mut properties = self.properties.write().unwrap();
        let property = properties
            .rows
            .get_mut(&id)
            .ok_or(AppError::NotFound("Property"))?;

        let new_count = property.rating_count + 1;
        let total = property.avg_rating * property.rating_count as f64 + rating;
        property.avg_rating = total / new_count as f64;
        property.rating_count = new_count;

        log::info!(
            "Property rated: id={} avg={:.2} count={}",
            id,
            property.avg_rating,
            property.rating_count
        );
        Ok(property.clone())
    }

    // Appointment operations

    pub fn get_appointment(&self, id: i64) -> Option<Appointment> {
        self.appointments.read().unwrap().rows.get(&id).cloned()
    }

    pub fn get_appointments_by_user(&self, user_id: i64) -> Vec<Appointment> {
        self.appointments
            .read()
            .unwrap()
            .all()
            .into_iter()
            .filter(|appointment| appointment.user_id == user_id)
            .collect()
    }

    pub fn get_appointments_by_property(&self, property_id: i64) -> Vec<Appointment> {
        self.appointments
            .read()
            .unwrap()
            .all()
            .into_iter()
            .filter(|appointment| appointment.property_id == property_id)
            .collect()
    }

    pub fn create_appointment(&self, insert: InsertAppointment, user_id: i64) -> Appointment {
        let mut appointments = self.appointments.write().unwrap();
        let id = appointments.allocate_id();
        let appointment = Appointment {
            id,
            property_id: insert.property_id,
            user_id,
            date: insert.date,
            message: insert.message,
            status: insert.status,
            created_at: Utc::now(),
        };
        appointments.rows.insert(id, appointment.clone());
        log::info!(
            "Appointment created: id={} property={} user={}",
            appointment.id,
            appointment.property_id,
            appointment.user_id
        );
        appointment
    }

    pub fn update_appointment(&self, id: i64, patch: AppointmentPatch) -> Option<Appointment> {
        let mut appointments = self.appointments.write().unwrap();
        let appointment = appointments.rows.get_mut(&id)?;

        if let Some(date) = patch.date {
            appointment.date = date;
        }
        if let Some(message) = patch.message {
            appointment.message = Some(message);
        }
        if let Some(status) = patch.status {
            appointment.status = status;
        }

        log::info!("Appointment updated: id={}", id);
        Some(appointment.clone())
    }

    // Agent operations

    pub fn get_agent(&self, id: i64) -> Option<Agent> {
        self.agents.read().unwrap().rows.get(&id).cloned()
    }

    pub fn get_agents(&self) -> Vec<Agent> {
        self.agents.read().unwrap().all()
    }

    pub fn create_agent(&self, insert: InsertAgent) -> Agent {
        let mut agents = self.agents.write().unwrap();
        let id = agents.allocate_id();
        let agent = Agent {
            id,
            name: insert.name,
            specialization: insert.specialization,
            rating: insert.rating,
            properties_sold: insert.properties_sold,
            image_url: insert.image_url,
        };
        agents.rows.insert(id, agent.clone());
        agent
    }

    fn seed_agents(&self) {
        let seed = [
            ("Sarah Johnson", "Luxury Home Specialist", 4.8, 200, "/agent1.jpg"),
            ("Michael Rodriguez", "First-time Buyer Expert", 5.0, 150, "/agent2.jpg"),
            ("Emily Chen", "Investment Property Specialist", 4.2, 120, "/agent3.jpg"),
            ("David Williams", "Commercial Real Estate", 4.7, 180, "/agent4.jpg"),
        ];
        for (name, specialization, rating, properties_sold, image_url) in seed {
            self.create_agent(InsertAgent {
                name: name.to_owned(),
                specialization: specialization.to_owned(),
                rating,
                properties_sold,
                image_url: image_url.to_owned(),
            });
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PropertyFilter;
    use chrono::Utc;

    fn insert_property(title: &str, city: &str, price: &str, beds: i32) -> InsertProperty {
        InsertProperty {
            title: title.to_owned(),
            description: format!("{title} listing"),
            price: price.to_owned(),
            address: "1 Test St".to_owned(),
            city: city.to_owned(),
            state: "TX".to_owned(),
            zip_code: "00000".to_owned(),
            lat: "0".to_owned(),
            lng: "0".to_owned(),
            bedrooms: beds,
            bathrooms: 2,
            square_feet: 1500,
            year_built: Some(1990),
            property_type: "House".to_owned(),
            listing_type: "buy".to_owned(),
            image_url: "/p.jpg".to_owned(),
            featured: false,
            status: "available".to_owned(),
        }
    }

    fn filter_of(fields: &[(&str, &str)]) -> PropertyFilter {
        let map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), serde_json::Value::String((*v).to_owned())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    fn seeded_store() -> (Store, Property, Property) {
        let store = Store::new();
        let p1 = store.create_property(
            insert_property("Craftsman", "Los Angeles", "500000", 3),
            1,
        );
        let p2 = store.create_property(insert_property("Bungalow", "Austin", "300000", 2), 1);
        (store, p1, p2)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let (_, p1, p2) = seeded_store();
        assert_eq!(p1.id, 1);
        assert_eq!(p2.id, 2);
    }

    #[test]
    fn query_applies_every_predicate() {
        let (store, p1, _) = seeded_store();

        let matches = store.get_properties(&filter_of(&[("city", "los")]).compile());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, p1.id);

        let matches = store.get_properties(&filter_of(&[("minPrice", "400000")]).compile());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, p1.id);

        // both predicates must hold
        let matches = store.get_properties(
            &filter_of(&[("city", "los"), ("minBeds", "4")]).compile(),
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn malformed_filter_values_do_not_narrow() {
        let (store, _, _) = seeded_store();
        let matches = store.get_properties(
            &filter_of(&[("minPrice", "not a number"), ("minBeds", "")]).compile(),
        );
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn query_returns_storage_order() {
        let (store, p1, p2) = seeded_store();
        let all = store.get_properties(&PropertyFilter::default().compile());
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![p1.id, p2.id]
        );
    }

    #[test]
    fn featured_returns_only_flagged_properties() {
        let (store, p1, _) = seeded_store();
        assert!(store.get_featured_properties().is_empty());

        store.update_property(
            p1.id,
            PropertyPatch {
                featured: Some(true),
                ..PropertyPatch::default()
            },
        );
        let featured = store.get_featured_properties();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, p1.id);
    }

    #[test]
    fn rating_keeps_the_arithmetic_mean() {
        let (store, _, p2) = seeded_store();

        let rated = store.rate_property(p2.id, 4.0).unwrap();
        assert_eq!(rated.rating_count, 1);
        assert!((rated.avg_rating - 4.0).abs() < 1e-9);

        let rated = store.rate_property(p2.id, 2.0).unwrap();
        assert_eq!(rated.rating_count, 2);
        assert!((rated.avg_rating - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rating_mean_is_order_independent() {
        let (store, p1, p2) = seeded_store();

        for rating in [5.0, 3.0, 4.0] {
            store.rate_property(p1.id, rating).unwrap();
        }
        for rating in [4.0, 5.0, 3.0] {
            store.rate_property(p2.id, rating).unwrap();
        }

        let a = store.get_property(p1.id).unwrap();
        let b = store.get_property(p2.id).unwrap();
        assert_eq!(a.rating_count, 3);
        assert_eq!(b.rating_count, 3);
        assert!((a.avg_rating - b.avg_rating).abs() < 1e-9);
        assert!((a.avg_rating - 4.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_rating_is_rejected_without_mutation() {
        let (store, p1, _) = seeded_store();

        assert!(matches!(
            store.rate_property(p1.id, 0.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            store.rate_property(p1.id, 5.5),
            Err(AppError::Validation(_))
        ));

        let untouched = store.get_property(p1.id).unwrap();
        assert_eq!(untouched.rating_count, 0);
        assert_eq!(untouched.avg_rating, 0.0);
    }

    #[test]
    fn rating_a_missing_property_is_not_found() {
        let (store, _, _) = seeded_store();
        assert!(matches!(
            store.rate_property(999, 3.0),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn saving_a_favorite_is_idempotent() {
        let (store, p1, _) = seeded_store();
        let user = store
            .create_user(InsertUser {
                username: "buyer".to_owned(),
                password: "a sufficiently long pw".to_owned(),
                email: "buyer@example.com".to_owned(),
                full_name: "Buyer One".to_owned(),
            })
            .unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.saved_properties, "[]");

        let once = store
            .update_user_saved_properties(user.id, p1.id, true)
            .unwrap();
        let twice = store
            .update_user_saved_properties(user.id, p1.id, true)
            .unwrap();
        assert_eq!(once.saved_property_ids(), vec![p1.id]);
        assert_eq!(twice.saved_property_ids(), vec![p1.id]);
    }

    #[test]
    fn removing_an_absent_favorite_is_a_noop() {
        let (store, p1, p2) = seeded_store();
        let user = store
            .create_user(InsertUser {
                username: "buyer".to_owned(),
                password: "a sufficiently long pw".to_owned(),
                email: "buyer@example.com".to_owned(),
                full_name: "Buyer One".to_owned(),
            })
            .unwrap();

        store.update_user_saved_properties(user.id, p1.id, true);
        let after = store
            .update_user_saved_properties(user.id, p2.id, false)
            .unwrap();
        assert_eq!(after.saved_property_ids(), vec![p1.id]);

        let cleared = store
            .update_user_saved_properties(user.id, p1.id, false)
            .unwrap();
        assert!(cleared.saved_property_ids().is_empty());
    }

    #[test]
    fn favorites_for_unknown_user_are_not_found() {
        let (store, p1, _) = seeded_store();
        assert!(store.update_user_saved_properties(42, p1.id, true).is_none());
    }

    #[test]
    fn property_updates_are_partial() {
        let (store, p1, _) = seeded_store();
        let updated = store
            .update_property(
                p1.id,
                PropertyPatch {
                    status: Some("open_house".to_owned()),
                    ..PropertyPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, "open_house");
        assert_eq!(updated.title, p1.title);
        assert_eq!(updated.price, p1.price);
    }

    #[test]
    fn delete_property_reports_whether_it_existed() {
        let (store, p1, _) = seeded_store();
        assert!(store.delete_property(p1.id));
        assert!(!store.delete_property(p1.id));
        assert!(store.get_property(p1.id).is_none());
    }

    #[test]
    fn appointments_filter_by_user_and_property() {
        let (store, p1, p2) = seeded_store();
        let date = Utc::now();

        store.create_appointment(
            InsertAppointment {
                property_id: p1.id,
                date,
                message: None,
                status: "pending".to_owned(),
            },
            7,
        );
        store.create_appointment(
            InsertAppointment {
                property_id: p2.id,
                date,
                message: Some("morning preferred".to_owned()),
                status: "pending".to_owned(),
            },
            7,
        );
        store.create_appointment(
            InsertAppointment {
                property_id: p1.id,
                date,
                message: None,
                status: "pending".to_owned(),
            },
            8,
        );

        assert_eq!(store.get_appointments_by_user(7).len(), 2);
        assert_eq!(store.get_appointments_by_property(p1.id).len(), 2);
        assert_eq!(store.get_appointments_by_user(9).len(), 0);
    }

    #[test]
    fn appointment_status_can_be_updated() {
        let (store, p1, _) = seeded_store();
        let appointment = store.create_appointment(
            InsertAppointment {
                property_id: p1.id,
                date: Utc::now(),
                message: None,
                status: "pending".to_owned(),
            },
            7,
        );

        let updated = store
            .update_appointment(
                appointment.id,
                AppointmentPatch {
                    status: Some("confirmed".to_owned()),
                    ..AppointmentPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, "confirmed");
        assert_eq!(updated.date, appointment.date);
    }

    #[test]
    fn store_starts_with_seeded_agents() {
        let store = Store::new();
        let agents = store.get_agents();
        assert_eq!(agents.len(), 4);
        assert_eq!(agents[0].id, 1);
        assert_eq!(agents[0].name, "Sarah Johnson");
        assert!(store.get_agent(4).is_some());
        assert!(store.get_agent(5).is_none());
    }
}
