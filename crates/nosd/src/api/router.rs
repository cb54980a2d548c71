use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::daemon::state::AppState;

use super::handlers::{
    auth_login, auth_logout, auth_refresh, auth_session, firewall_apply, firewall_confirm,
    firewall_plan, firewall_rollback, firewall_state, healthz, pools_apply_create, pools_get,
    pools_import, pools_list, pools_plan_create, setup_create_admin, setup_verify_otp, shares_create,
    shares_delete, shares_list, shares_test, shares_update, totp_backup_codes, totp_disable,
    totp_enroll, totp_verify, tx_log, tx_status, tx_stream, updates_apply, updates_progress,
    updates_rollback,
};

/// Builds the full router for `nosd`'s HTTP API. `tx_status`/`tx_log`/`tx_stream`
/// are mounted once per domain (`pools`, `net`, `updates`) since every domain's
/// transactions share the same shape; handlers don't care which prefix matched.
pub fn build_router(state: AppState) -> Router {
    let tx_routes = || {
        Router::new()
            .route("/{id}/status", get(tx_status))
            .route("/{id}/log", get(tx_log))
            .route("/{id}/stream", get(tx_stream))
    };

    Router::new()
        .route("/healthz", get(healthz))
        .nest(
            "/api/v1",
            Router::new()
                .route("/setup/verify-otp", post(setup_verify_otp))
                .route("/setup/create-admin", post(setup_create_admin))
                .route("/auth/login", post(auth_login))
                .route("/auth/logout", post(auth_logout))
                .route("/auth/refresh", post(auth_refresh))
                .route("/auth/session", get(auth_session))
                .route("/auth/totp/enroll", post(totp_enroll))
                .route("/auth/totp/verify", post(totp_verify))
                .route("/auth/totp/disable", post(totp_disable))
                .route("/auth/totp/backup-codes", post(totp_backup_codes))
                .route("/pools", get(pools_list))
                .route("/pools/{uuid}", get(pools_get))
                .route("/pools/plan-create", post(pools_plan_create))
                .route("/pools/apply-create", post(pools_apply_create))
                .route("/pools/import", post(pools_import))
                .nest("/pools/tx", tx_routes())
                .route("/shares", get(shares_list).post(shares_create))
                .route("/shares/{name}", patch(shares_update).delete(shares_delete))
                .route("/shares/{name}/test", post(shares_test))
                .route("/net/firewall/state", get(firewall_state))
                .route("/net/firewall/plan", post(firewall_plan))
                .route("/net/firewall/apply", post(firewall_apply))
                .route("/net/firewall/confirm", post(firewall_confirm))
                .route("/net/firewall/rollback", post(firewall_rollback))
                .nest("/net/tx", tx_routes())
                .route("/updates/apply", post(updates_apply))
                .route("/updates/progress/{id}", get(updates_progress))
                .route("/updates/rollback/{id}", post(updates_rollback))
                .nest("/updates/tx", tx_routes()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
