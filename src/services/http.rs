use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    deposits::DepositServiceRequest, games::GameRequest, notifier::Notifier,
    transactions::TransactionServiceRequest, users::UserRequest,
    withdrawals::WithdrawalServiceRequest, Responder, ServiceError,
};

mod games;
mod session;
mod users;
mod wallet;
mod ws;

pub use session::{CurrentUser, Sessions, COOKIE_NAME};

#[derive(Clone)]
pub struct AppState {
    pub user_channel: mpsc::Sender<UserRequest>,
    pub game_channel: mpsc::Sender<GameRequest>,
    pub deposit_channel: mpsc::Sender<DepositServiceRequest>,
    pub withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
    pub transaction_channel: mpsc::Sender<TransactionServiceRequest>,
    pub sessions: Sessions,
    pub notifier: Notifier,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Unauthorized | ServiceError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::Validation(_)
            | ServiceError::AlreadyProcessed(_)
            | ServiceError::InsufficientBalance => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Database(_)
            | ServiceError::Communication(_, _)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

/// JSON body whose rejections render like every other API error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

/// Sends a request to a service and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(Responder<T>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel.send(request(response_tx)).await.map_err(|e| {
        ServiceError::Communication("Failed to process request".to_string(), e.to_string())
    })?;

    response_rx.await.map_err(|e| {
        ServiceError::Communication("Failed to receive response".to_string(), e.to_string())
    })?
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(users::register))
        .route("/api/login", post(users::login))
        .route("/api/logout", post(users::logout))
        .route("/api/user", get(users::current_user))
        .route("/api/users/settings", patch(users::update_settings))
        .route("/api/users/password", patch(users::change_password))
        .route("/api/games", post(games::play))
        .route("/api/games/history", get(games::history))
        .route("/api/leaderboard", get(games::leaderboard))
        .route(
            "/api/deposits",
            get(wallet::list_deposits).post(wallet::create_deposit),
        )
        .route("/api/deposits/verify", post(wallet::verify_deposit))
        .route(
            "/api/withdrawals",
            get(wallet::list_withdrawals).post(wallet::create_withdrawal),
        )
        .route("/api/withdrawals/recent", get(wallet::recent_withdrawals))
        .route("/api/transactions", get(wallet::transactions))
        .route("/ws", get(ws::connect))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(state: AppState, listen: &str) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
