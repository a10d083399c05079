//! Request body extractor for the POST endpoints.
//!
//! Accepts JSON and, for plain HTML forms, `application/x-www-form-urlencoded`.
//! Rejections come back as the usual `{ "error": ... }` JSON instead of
//! axum's plain-text bodies.

use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::response::Response;
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::api::error::api_error;

pub struct ApiBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            return match Form::<T>::from_request(req, state).await {
                Ok(Form(value)) => Ok(Self(value)),
                Err(rejection) => Err(api_error(rejection.status(), rejection.body_text())),
            };
        }

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(api_error(rejection.status(), rejection.body_text())),
        }
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}
