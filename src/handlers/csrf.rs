use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::error::AppResult;
use crate::middleware::issue_csrf_token;
use crate::models::CsrfTokenResponse;
use crate::session::CurrentSession;
use crate::state::AppState;

/// Hand the session's CSRF token to the SPA.
///
/// The token already exists by the time this runs (the issuing middleware
/// saw the request first); issuing again returns the same value.
#[instrument(skip(state, session), fields(new_session = session.is_new))]
pub async fn csrf_token(
    State(state): State<AppState>,
    session: CurrentSession,
) -> AppResult<Json<CsrfTokenResponse>> {
    let csrf_token = issue_csrf_token(state.sessions.as_ref(), &session.id).await?;
    Ok(Json(CsrfTokenResponse { csrf_token }))
}
