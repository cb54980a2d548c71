use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use shared::model::User;
use uuid::Uuid;

use crate::daemon::state::AppState;

use super::errors::ApiError;

pub const SESSION_COOKIE: &str = "nos_session";
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Set by the local reverse proxy in front of nosd; only trusted when the
/// connecting peer is itself loopback (see `shared::util::resolve_client_ip`).
pub(crate) const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// An authenticated request: the session row plus the user it belongs to and
/// the connection's source IP (needed by handlers that re-touch the session
/// or decide elevation).
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: User,
    pub session: shared::model::Session,
    pub source_ip: std::net::IpAddr,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(SESSION_COOKIE)
            .and_then(|c| Uuid::parse_str(c.value()).ok())
            .ok_or_else(|| ApiError::unauthorized("missing session cookie"))?;

        let ConnectInfo(addr) = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::internal(anyhow::anyhow!("missing connection info")))?;

        let forwarded_for = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok());
        let source_ip = shared::util::resolve_client_ip(addr.ip(), forwarded_for);

        let session = state
            .sessions
            .touch(session_id, source_ip)?
            .ok_or_else(|| ApiError::unauthorized("session expired or not found"))?;

        let user = state
            .users
            .find_by_id(session.user_id)?
            .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

        Ok(SessionUser {
            user,
            session,
            source_ip,
        })
    }
}

/// A `SessionUser` whose session is currently elevated (LAN/VPN source, or a
/// TOTP verification within the elevation window). Required for any admin
/// mutation per the elevation rule.
#[derive(Debug, Clone)]
pub struct ElevatedUser(pub SessionUser);

impl FromRequestParts<AppState> for ElevatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session_user = SessionUser::from_request_parts(parts, state).await?;
        if !state.sessions.is_elevated(&session_user.session, &state.ipclass) {
            return Err(ApiError::new(
                shared::error::ErrorCode::AuthTotpRequired,
                axum::http::StatusCode::FORBIDDEN,
                "session is not elevated",
            ));
        }
        Ok(ElevatedUser(session_user))
    }
}
