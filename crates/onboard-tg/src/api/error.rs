use crate::prelude::*;
use crate::Error;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    status_code: u16,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();

        // Internal details must not leak to the clients, they are
        // in the logs under the error id
        let detail = if status.is_server_error() {
            error!(err = tracing_err(&self), id = self.id(), "Request failed");
            "Internal Server Error".to_owned()
        } else {
            self.kind().to_string()
        };

        let body = ErrorBody {
            detail,
            status_code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}
