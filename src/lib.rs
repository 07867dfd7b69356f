pub mod errors;
pub mod filter;
pub mod routes;
pub mod store;
pub mod structs;
pub mod utils;

use store::Store;

#[derive(Debug)]
pub struct AppState {
    pub store: Store,
}
