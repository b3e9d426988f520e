use actix_web::{Result, route, web::Json};
use serde_json::{Value, json};

#[route("/health", method = "GET")]
pub async fn health_endpoint() -> Result<Json<Value>> {
    log::info!("Healthy");
    Ok(Json(json!({"healthy": true})))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};
    use pretty_assertions::assert_eq;

    use super::*;

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(App::new().service(health_endpoint)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({"healthy": true}));
    }
}
