use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::Error;
use crate::models::User;
use crate::AppState;

/// Parses `Authorization: TOKEN <api_key>` (case-insensitive scheme) and
/// injects the resolved `User` as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Error> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(Error::Unauthenticated)?;

    let mut parts = header_value.splitn(2, ' ');
    let scheme = parts.next().ok_or(Error::Unauthenticated)?;
    let api_key = parts.next().ok_or(Error::Unauthenticated)?;

    if !scheme.eq_ignore_ascii_case("token") {
        return Err(Error::Unauthenticated);
    }

    let user = User::find_by_api_key(&state.pool, api_key)
        .await?
        .ok_or(Error::Unauthenticated)?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Gate applied after `auth_middleware`: rejects non-admin callers.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, Error> {
    let user = req
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or(Error::Unauthenticated)?;

    if !user.is_admin() {
        return Err(Error::Forbidden);
    }

    Ok(next.run(req).await)
}
