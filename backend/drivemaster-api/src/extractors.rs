use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

/// JSON body extractor that also runs `validator` rules, answering with a
/// JSON 400 body on either failure.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: serde::de::DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => value,
            Err(rejection) => {
                return Err(bad_request(format!(
                    "Failed to parse JSON request body: {}",
                    rejection
                )))
            }
        };

        if let Err(e) = value.validate() {
            return Err(bad_request(format!("Validation error: {}", e)));
        }

        Ok(ValidJson(value))
    }
}

fn bad_request(message: String) -> Response {
    tracing::warn!("{}", message);
    let body = json!({
        "error": message,
        "status": 400
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
