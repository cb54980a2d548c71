use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::Sse;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use uuid::Uuid;

use shared::error::ErrorCode;
use shared::model::{FirewallMode, NfsConfig, Pool, RaidProfile, Share, SmbConfig};

use crate::auth::totp;
use crate::auth::users::LoginOutcome;
use crate::daemon::state::AppState;
use crate::workflows::firewall::{self, FirewallDesired};
use crate::workflows::pool::{self, PoolCreateIntent};
use crate::workflows::share::{self, ShareIntent};
use crate::workflows::updates::{self, UpdateIntent};

use super::errors::ApiError;
use super::extractors::{ElevatedUser, SessionUser, FORWARDED_FOR_HEADER, SESSION_COOKIE};
use super::sse::tx_event_stream;

/// Resolves the request's real client address the same way `SessionUser`
/// does, for the handlers that need it before a session row exists yet.
fn client_ip(addr: SocketAddr, headers: &HeaderMap) -> std::net::IpAddr {
    let forwarded_for = headers.get(FORWARDED_FOR_HEADER).and_then(|v| v.to_str().ok());
    shared::util::resolve_client_ip(addr.ip(), forwarded_for)
}

fn session_cookie(session_id: Uuid, remember_me: bool, ttl_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    if remember_me {
        cookie.set_max_age(Some(axum_extra::extract::cookie::time::Duration::seconds(ttl_secs)));
    }
    cookie
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_max_age(Some(axum_extra::extract::cookie::time::Duration::seconds(0)));
    cookie
}

// ---- setup ----

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    otp: String,
}

pub async fn setup_verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.users.any_admin_exists()? {
        return Err(ApiError::new(
            ErrorCode::SetupAlreadyComplete,
            StatusCode::CONFLICT,
            "setup already complete",
        ));
    }
    if state.firstboot.verify(&body.otp)? {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(ApiError::new(
            ErrorCode::SetupOtpInvalid,
            StatusCode::UNAUTHORIZED,
            "invalid or expired one-time setup code",
        ))
    }
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    otp: String,
    username: String,
    password: String,
}

pub async fn setup_create_admin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<CreateAdminRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if state.users.any_admin_exists()? {
        return Err(ApiError::new(
            ErrorCode::SetupAlreadyComplete,
            StatusCode::CONFLICT,
            "setup already complete",
        ));
    }
    if !state.firstboot.verify(&body.otp)? {
        return Err(ApiError::new(
            ErrorCode::SetupOtpInvalid,
            StatusCode::UNAUTHORIZED,
            "invalid or expired one-time setup code",
        ));
    }

    let user = state.users.create_admin(&body.username, &body.password)?;
    state.firstboot.consume()?;

    let session = state.sessions.create(user.id, false, client_ip(addr, &headers))?;
    let jar = jar.add(session_cookie(session.id, false, state.config.session_ttl_secs));

    Ok((jar, Json(json!({ "userId": user.id }))))
}

// ---- auth ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    username: String,
    password: String,
    code: Option<String>,
    #[serde(default)]
    remember_me: bool,
}

pub async fn auth_login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let addr = client_ip(addr, &headers);
    if let Err(retry_after) = state.login_limiter.check(addr, "login") {
        return Err(ApiError::rate_limited(retry_after));
    }

    let outcome = state.users.verify_login(&body.username, &body.password)?;
    let user = match outcome {
        LoginOutcome::Success(user) => user,
        LoginOutcome::Locked => {
            return Err(ApiError::new(ErrorCode::AuthLocked, StatusCode::FORBIDDEN, "account locked"));
        }
        LoginOutcome::InvalidCredentials => {
            return Err(ApiError::unauthorized("invalid username or password"));
        }
    };

    if user.totp_armed() {
        let Some(code) = body.code.as_deref() else {
            return Err(ApiError::new(
                ErrorCode::AuthTotpRequired,
                StatusCode::UNAUTHORIZED,
                "totp code required",
            ));
        };
        let secret = user.totp_secret.as_deref().unwrap_or_default();
        if !totp::verify(secret, &user.username, code)? {
            return Err(ApiError::unauthorized("invalid totp code"));
        }
    }

    state.login_limiter.reset(addr, "login");

    let session = state.sessions.create(user.id, body.remember_me, addr)?;
    if user.totp_armed() {
        state.sessions.elevate(session.id)?;
    }

    let jar = jar.add(session_cookie(session.id, body.remember_me, state.config.session_ttl_secs));
    Ok((jar, Json(json!({ "userId": user.id }))))
}

pub async fn auth_logout(
    State(state): State<AppState>,
    jar: CookieJar,
    session_user: SessionUser,
) -> Result<CookieJar, ApiError> {
    state.sessions.revoke(session_user.session.id)?;
    Ok(jar.add(clear_session_cookie()))
}

pub async fn auth_refresh(session_user: SessionUser) -> Json<serde_json::Value> {
    Json(json!({ "expiresAt": session_user.session.expires_at.to_string() }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    user_id: Uuid,
    username: String,
    roles: Vec<shared::model::Role>,
    elevated: bool,
}

pub async fn auth_session(
    State(state): State<AppState>,
    session_user: SessionUser,
) -> Json<SessionView> {
    let elevated = state.sessions.is_elevated(&session_user.session, &state.ipclass);
    Json(SessionView {
        user_id: session_user.user.id,
        username: session_user.user.username,
        roles: session_user.user.roles,
        elevated,
    })
}

// ---- totp ----

pub async fn totp_enroll(
    State(state): State<AppState>,
    elevated: ElevatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = elevated.0.user;
    let enrollment = totp::begin_enrollment(&user.username)?;
    state.pending_totp.insert(elevated.0.session.id, enrollment.secret.clone());
    Ok(Json(json!({
        "otpauthUrl": enrollment.otpauth_url,
        "secret": enrollment.secret,
    })))
}

#[derive(Deserialize)]
pub struct TotpVerifyRequest {
    code: String,
}

pub async fn totp_verify(
    State(state): State<AppState>,
    elevated: ElevatedUser,
    Json(body): Json<TotpVerifyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id = elevated.0.session.id;
    let user = elevated.0.user;
    let Some(secret) = state.pending_totp.take(session_id) else {
        return Err(ApiError::unauthorized("no pending totp enrollment"));
    };

    match totp::confirm_enrollment(&state.users, user.id, &user.username, &secret, &body.code)? {
        Some(recovery_codes) => {
            state.sessions.elevate(session_id)?;
            Ok(Json(json!({ "ok": true, "recoveryCodes": recovery_codes })))
        }
        None => Err(ApiError::unauthorized("invalid totp code")),
    }
}

pub async fn totp_disable(
    State(state): State<AppState>,
    elevated: ElevatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    totp::disable(&state.users, elevated.0.user.id)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn totp_backup_codes(
    State(state): State<AppState>,
    elevated: ElevatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = elevated.0.user;
    let Some(secret) = user.totp_secret else {
        return Err(ApiError::unauthorized("totp not enrolled"));
    };
    let recovery_codes = totp::regenerate_recovery_codes(&state.users, user.id, secret)?;
    Ok(Json(json!({ "recoveryCodes": recovery_codes })))
}

// ---- transactions ----

pub async fn tx_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _session_user: SessionUser,
) -> Result<Json<shared::model::Tx>, ApiError> {
    Ok(Json(state.engine.status(id)?))
}

#[derive(Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    cursor: u64,
    #[serde(default = "default_log_max")]
    max: usize,
}

fn default_log_max() -> usize {
    200
}

pub async fn tx_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::extract::Query(query): axum::extract::Query<LogQuery>,
    _session_user: SessionUser,
) -> Result<Json<txengine::LogPage>, ApiError> {
    Ok(Json(state.engine.log(id, query.cursor, query.max)?))
}

pub async fn tx_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _session_user: SessionUser,
) -> Result<Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let rx = state.engine.stream(id).await?;
    Ok(Sse::new(tx_event_stream(rx)))
}

// ---- pools ----

pub async fn pools_list(
    State(state): State<AppState>,
    _session_user: SessionUser,
) -> Result<Json<Vec<Pool>>, ApiError> {
    Ok(Json(state.pools.list()?))
}

pub async fn pools_get(
    State(state): State<AppState>,
    _session_user: SessionUser,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Pool>, ApiError> {
    let pool = state
        .pools
        .find(uuid)?
        .ok_or_else(|| ApiError::not_found(ErrorCode::Internal, format!("pool {uuid} not found")))?;
    Ok(Json(pool))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolCreateRequest {
    label: String,
    devices: Vec<String>,
    device_sizes: Vec<u64>,
    raid: RaidProfile,
    #[serde(default)]
    wipe: bool,
}

impl From<PoolCreateRequest> for PoolCreateIntent {
    fn from(body: PoolCreateRequest) -> Self {
        PoolCreateIntent {
            label: body.label,
            devices: body.devices,
            device_sizes: body.device_sizes,
            raid: body.raid,
            wipe: body.wipe,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPlanView {
    pool: Pool,
    capacity_bytes: u64,
    fstab_preview: String,
    steps: Vec<String>,
}

pub async fn pools_plan_create(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<PoolCreateRequest>,
) -> Result<Json<PoolPlanView>, ApiError> {
    let pool_plan = pool::plan_create(&state.pools, body.into())?;
    Ok(Json(PoolPlanView {
        steps: pool_plan.plan.steps.iter().map(|s| s.name.clone()).collect(),
        pool: pool_plan.pool,
        capacity_bytes: pool_plan.capacity_bytes,
        fstab_preview: pool_plan.fstab_preview,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolApplyView {
    tx_id: Uuid,
    pool: Pool,
}

pub async fn pools_apply_create(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<PoolCreateRequest>,
) -> Result<Json<PoolApplyView>, ApiError> {
    let (tx_id, pool_plan) = pool::apply_create(&state.pools, &state.engine, body.into()).await?;
    Ok(Json(PoolApplyView { tx_id, pool: pool_plan.pool }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolImportRequest {
    uuid: Uuid,
    device: String,
    label: String,
}

pub async fn pools_import(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<PoolImportRequest>,
) -> Result<Json<PoolApplyView>, ApiError> {
    let (tx_id, pool_plan) =
        pool::apply_import(&state.pools, &state.engine, body.uuid, body.device, body.label).await?;
    Ok(Json(PoolApplyView { tx_id, pool: pool_plan.pool }))
}

// ---- shares ----

pub async fn shares_list(
    State(state): State<AppState>,
    _session_user: SessionUser,
) -> Result<Json<Vec<Share>>, ApiError> {
    Ok(Json(state.shares.list()?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsNetworkEntryRequest {
    network: String,
    read_only: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    name: String,
    smb: Option<SmbConfig>,
    nfs: Option<NfsConfig>,
    #[serde(default)]
    owners: Vec<String>,
    #[serde(default)]
    readers: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    nfs_networks: Vec<NfsNetworkEntryRequest>,
}

impl From<ShareRequest> for ShareIntent {
    fn from(body: ShareRequest) -> Self {
        ShareIntent {
            name: body.name,
            smb: body.smb,
            nfs: body.nfs,
            owners: body.owners,
            readers: body.readers,
            description: body.description,
            nfs_networks: body
                .nfs_networks
                .into_iter()
                .map(|e| template::NfsNetworkEntry { network: e.network, read_only: e.read_only })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIdView {
    tx_id: Uuid,
}

pub async fn shares_create(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<ShareRequest>,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id = share::apply_create_or_update(&state.shares, &state.engine, body.into(), false).await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn shares_update(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Path(name): Path<String>,
    Json(mut body): Json<ShareRequest>,
) -> Result<Json<TxIdView>, ApiError> {
    body.name = name;
    let tx_id = share::apply_create_or_update(&state.shares, &state.engine, body.into(), true).await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn shares_delete(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Path(name): Path<String>,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id = share::apply_delete(&state.shares, &state.engine, &name).await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn shares_test(
    State(state): State<AppState>,
    _session_user: SessionUser,
    Path(name): Path<String>,
) -> Result<Json<TxIdView>, ApiError> {
    let existing = state.shares.find(&name)?.ok_or_else(|| {
        ApiError::not_found(ErrorCode::ValidationShareNameExists, format!("share {name} does not exist"))
    })?;
    let smb_enabled = existing.smb.as_ref().is_some_and(|s| s.enabled);
    let nfs_enabled = existing.nfs.as_ref().is_some_and(|n| n.enabled);
    let tx_id = share::test_share(&state.engine, &name, smb_enabled, nfs_enabled).await?;
    Ok(Json(TxIdView { tx_id }))
}

// ---- firewall ----

pub async fn firewall_state(
    State(state): State<AppState>,
    _session_user: SessionUser,
) -> Result<Json<shared::model::FirewallState>, ApiError> {
    Ok(Json(state.firewall.load()?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRequest {
    mode: FirewallMode,
    #[serde(default)]
    enable_wg: bool,
    #[serde(default)]
    enable_https: bool,
    #[serde(default = "default_wg_port")]
    wg_port: u16,
    #[serde(default)]
    custom_rules: Vec<String>,
}

fn default_wg_port() -> u16 {
    51820
}

impl From<FirewallRequest> for FirewallDesired {
    fn from(body: FirewallRequest) -> Self {
        FirewallDesired {
            mode: body.mode,
            enable_wg: body.enable_wg,
            enable_https: body.enable_https,
            wg_port: body.wg_port,
            custom_rules: body.custom_rules,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallPlanView {
    rendered: String,
    diff: String,
}

pub async fn firewall_plan(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<FirewallRequest>,
) -> Result<Json<FirewallPlanView>, ApiError> {
    let current = state.firewall.load()?;
    let built = firewall::plan_firewall(&current, &body.into())?;
    Ok(Json(FirewallPlanView { rendered: built.rendered, diff: built.diff }))
}

pub async fn firewall_apply(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<FirewallRequest>,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id = firewall::apply_firewall(
        &state.firewall,
        &state.engine,
        body.into(),
        state.config.firewall_rollback_timeout_secs,
    )
    .await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn firewall_confirm(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    firewall::confirm_firewall(&state.firewall)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn firewall_rollback(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id = firewall::rollback(&state.firewall, &state.engine).await?;
    Ok(Json(TxIdView { tx_id }))
}

// ---- updates ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplyRequest {
    packages: Vec<String>,
    reason: String,
    #[serde(default)]
    btrfs_targets: Vec<String>,
    #[serde(default)]
    services_to_restart: Vec<String>,
}

impl From<UpdateApplyRequest> for UpdateIntent {
    fn from(body: UpdateApplyRequest) -> Self {
        UpdateIntent {
            packages: body.packages,
            reason: body.reason,
            btrfs_targets: body.btrfs_targets,
            services_to_restart: body.services_to_restart,
        }
    }
}

pub async fn updates_apply(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Json(body): Json<UpdateApplyRequest>,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id =
        updates::apply_update(&state.updates, &state.engine, &state.config.snapdb_dir, body.into()).await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn updates_progress(
    State(state): State<AppState>,
    _session_user: SessionUser,
    Path(id): Path<Uuid>,
) -> Result<Json<shared::model::UpdateTx>, ApiError> {
    Ok(Json(updates::progress(&state.updates, &state.engine, id)?))
}

pub async fn updates_rollback(
    State(state): State<AppState>,
    _elevated: ElevatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TxIdView>, ApiError> {
    let tx_id = updates::rollback_update(&state.updates, &state.engine, id).await?;
    Ok(Json(TxIdView { tx_id }))
}

pub async fn healthz() -> &'static str {
    "ok"
}
