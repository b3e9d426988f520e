#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

mod api;
mod ws;

use std::env;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http, middleware, web};

use crate::ws::server::RoomRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let service_port = {
        let args: Vec<String> = env::args().collect();

        if args.len() > 1 {
            args[1].parse::<u16>().unwrap()
        } else {
            8000
        }
    };

    let db_path = env::var("DB_PATH").unwrap_or_else(|_| "loveping.db".to_string());

    loveping_database::init(&db_path).expect("Failed to initialize database");

    let registry = web::Data::new(RoomRegistry::new());

    let app = move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .app_data(registry.clone())
            .service(api::health_endpoint)
            .service(loveping_auth::api::bind_services(web::scope("/auth")))
            .service(loveping_spotify::api::bind_services(web::scope("/spotify")))
            .service(ws::api::websocket)
    };

    HttpServer::new(app)
        .bind(("0.0.0.0", service_port))?
        .run()
        .await
}
