use axum::{extract::Request, middleware::Next, response::Response};
use tracing::debug;

use tracklink_shared::constants::HEADER_USER_ID;

use crate::error::ServerError;

/// The authenticated chat user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

/// Reject requests without a user header and expose the caller to handlers
/// as an `Extension<CallerId>`.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, ServerError> {
    let user_id = req
        .headers()
        .get(HEADER_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let Some(user_id) = user_id else {
        debug!(path = %req.uri().path(), "Rejected request without user header");
        return Err(ServerError::Unauthorized);
    };

    req.extensions_mut().insert(CallerId(user_id));
    Ok(next.run(req).await)
}

/// `true` for ids shaped like the chat platform's: 26 lowercase alphanumerics.
pub fn is_valid_chat_id(id: &str) -> bool {
    id.len() == tracklink_shared::constants::CHAT_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}
