//! JSON body extractor whose rejections use the service error body.

use axum::{Json, extract::FromRequest};
use axum_valid::HasValidate;

use crate::error::AppError;

/// `Json<T>` that answers malformed bodies with a 400 `{message}` instead of axum's plain-text 4xx.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T> HasValidate for AppJson<T> {
    type Validate = T;

    fn get_validate(&self) -> &T {
        &self.0
    }
}
