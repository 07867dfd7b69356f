use std::env;

use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::Method,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer, Responder,
};
use log::info;

use homefinder::{routes, store::Store, AppState};

fn get_session_key() -> Key {
    let key_str = env::var("SESSION_KEY").unwrap_or_else(|_| {
        log::error!("FATAL: SESSION_KEY environment variable not set");
        std::process::exit(1);
    });
    Key::from(key_str.as_bytes())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    // one store for the whole server; workers share it through Data
    let state = Data::new(AppState {
        store: Store::new(),
    });

    info!("Starting HTTP server on http://{}:{}/", host, port);

    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            .wrap(IdentityMiddleware::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                get_session_key(),
            ))
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .service(routes::register_handler)
            .service(routes::login_handler)
            .service(routes::logout_handler)
            .service(routes::me_handler)
            .service(routes::featured_properties_handler)
            .service(routes::properties_handler)
            .service(routes::create_property_handler)
            .service(routes::rate_property_handler)
            .service(routes::property_handler)
            .service(routes::update_property_handler)
            .service(routes::delete_property_handler)
            .service(routes::appointments_handler)
            .service(routes::create_appointment_handler)
            .service(routes::update_appointment_handler)
            .service(routes::save_property_handler)
            .service(routes::unsave_property_handler)
            .service(routes::agents_handler)
            .service(routes::agent_handler)
            .app_data(state.clone())
            .default_service(web::to(default_handler))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> impl Responder {
    match req_method {
        Method::GET => {
            HttpResponse::NotFound().json(serde_json::json!({ "message": "Not found" }))
        }
        _ => HttpResponse::MethodNotAllowed().finish(),
    }
}
