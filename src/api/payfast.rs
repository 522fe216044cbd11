//! PayFast callback handlers
//!
//! PayFast reaches three routes: the server-to-server notify URL, and the
//! return and cancel URLs the customer's browser is sent back to. None of
//! them are authenticated; notifications are trusted after signature
//! verification in the transaction processor.

use crate::api::AppState;
use crate::payments::PayfastNotification;
use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use http::header::LOCATION;
use tracing::{error, info, warn};

/// Generic post-payment page the browser is sent to
pub const PAYMENT_PROCESS_PATH: &str = "/payment/process";

fn redirect_to_process() -> Response {
    (StatusCode::FOUND, [(LOCATION, PAYMENT_PROCESS_PATH)]).into_response()
}

/// PayFast ITN
pub async fn notify(State(state): State<AppState>, uri: Uri, body: Bytes) -> StatusCode {
    let data = PayfastNotification::from_request_parts(uri.query(), &body);
    info!("PayFast post data {:?}", data.fields());

    match state.processor.form_feedback(&data).await {
        Ok(tx) => {
            info!(
                "PayFast notification applied to tx {}: {}",
                tx.reference, tx.state
            );
            StatusCode::OK
        }
        Err(e) if e.is_validation() => {
            warn!("Unable to validate the PayFast payment: {}", e);
            StatusCode::OK
        }
        Err(e) => {
            error!("Failed to process PayFast notification: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Customer returns from PayFast after paying
pub async fn payment_return(uri: Uri, body: Bytes) -> Response {
    let data = PayfastNotification::from_request_parts(uri.query(), &body);
    info!("Beginning PayFast return with post data {:?}", data.fields());
    redirect_to_process()
}

/// Customer cancelled on the PayFast page
pub async fn payment_cancel(uri: Uri, body: Bytes) -> Response {
    let data = PayfastNotification::from_request_parts(uri.query(), &body);
    info!("Beginning PayFast cancel with post data {:?}", data.fields());
    redirect_to_process()
}
