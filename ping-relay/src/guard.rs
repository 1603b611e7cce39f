use crate::outcome::PingOutcome;
use crate::registry::{Appservice, Registry};
use std::sync::Arc;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("token does not belong to any appservice")]
    UnknownToken,

    #[error("token belongs to appservice {actual}, not {requested}")]
    AppserviceMismatch { requested: String, actual: String },
}

impl From<AuthError> for PingOutcome {
    fn from(_: AuthError) -> Self {
        PingOutcome::Forbidden
    }
}

/// Checks that `caller_token` is the `as_token` of the appservice named in the path.
///
/// This is a pure lookup. It runs before anything touches the network.
pub fn authorize(
    registry: &dyn Registry,
    caller_token: &str,
    path_appservice_id: &str,
) -> Result<Arc<Appservice>, AuthError> {
    let appservice = registry
        .find_by_token(caller_token)
        .ok_or(AuthError::UnknownToken)?;

    if appservice.id != path_appservice_id {
        return Err(AuthError::AppserviceMismatch {
            requested: path_appservice_id.to_string(),
            actual: appservice.id.clone(),
        });
    }

    Ok(appservice)
}
