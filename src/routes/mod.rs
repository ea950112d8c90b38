pub mod chat;

use actix_web::{error, web};

use crate::error::AppError;

pub use chat::create_routes;

/// JSON extractor settings; malformed bodies get the `{"detail"}` error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| {
            let message = match &err {
                error::JsonPayloadError::Deserialize(e) => e.to_string(),
                other => other.to_string(),
            };
            AppError::BadRequest(message).into()
        })
}
