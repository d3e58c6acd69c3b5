use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};

use crate::{repositories::Ledger, settings::Settings};

pub mod deposits;
pub mod games;
pub mod http;
pub mod mailer;
pub mod notifier;
pub mod password;
pub mod transactions;
pub mod users;
pub mod withdrawals;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    AlreadyProcessed(String),
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Database error: {0}")]
    Database(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub(crate) fn database(e: anyhow::Error) -> Self {
        ServiceError::Database(format!("{:#}", e))
    }
}

pub type Responder<T> = oneshot::Sender<Result<T, ServiceError>>;

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Per-user async locks serializing balance read-modify-write sequences on
/// this node.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<i32, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: i32) -> OwnedMutexGuard<()> {
        // The map guard must be dropped before awaiting the lock.
        let lock = self.locks.entry(user_id).or_default().clone();
        lock.lock_owned().await
    }
}

pub type SharedRng = Arc<Mutex<Box<dyn RngCore + Send>>>;

pub fn entropy_rng() -> SharedRng {
    shared_rng(StdRng::from_entropy())
}

pub fn shared_rng(rng: impl RngCore + Send + 'static) -> SharedRng {
    Arc::new(Mutex::new(Box::new(rng)))
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 8;

/// Eight uppercase alphanumeric characters, used for referral and deposit codes.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Collaborators shared by every request handler.
#[derive(Clone)]
pub struct ServiceContext {
    pub ledger: Ledger,
    pub locks: UserLocks,
    pub mailer: Arc<dyn mailer::Mailer>,
    pub notifier: notifier::Notifier,
    pub admin_address: String,
    pub rng: SharedRng,
}

/// Starts every service on its own task and returns the HTTP state wired to
/// their channels.
pub fn spawn_services(context: ServiceContext, sessions: http::Sessions) -> http::AppState {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (game_tx, mut game_rx) = mpsc::channel(512);
    let (deposit_tx, mut deposit_rx) = mpsc::channel(512);
    let (withdrawal_tx, mut withdrawal_rx) = mpsc::channel(512);
    let (transaction_tx, mut transaction_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut game_service = games::GameService::new();
    let mut deposit_service = deposits::DepositService::new();
    let mut withdrawal_service = withdrawals::WithdrawalService::new();
    let mut transaction_service = transactions::TransactionService::new();

    log::info!("Starting user service.");
    let user_handler = users::UserRequestHandler::new(context.clone());
    tokio::spawn(async move {
        user_service.run(user_handler, &mut user_rx).await;
    });

    log::info!("Starting game service.");
    let game_handler = games::GameRequestHandler::new(context.clone());
    tokio::spawn(async move {
        game_service.run(game_handler, &mut game_rx).await;
    });

    log::info!("Starting deposit service.");
    let deposit_handler = deposits::DepositRequestHandler::new(context.clone());
    tokio::spawn(async move {
        deposit_service.run(deposit_handler, &mut deposit_rx).await;
    });

    log::info!("Starting withdrawal service.");
    let withdrawal_handler = withdrawals::WithdrawalRequestHandler::new(context.clone());
    tokio::spawn(async move {
        withdrawal_service
            .run(withdrawal_handler, &mut withdrawal_rx)
            .await;
    });

    log::info!("Starting transaction service.");
    let transaction_handler = transactions::TransactionRequestHandler::new(context.ledger.clone());
    tokio::spawn(async move {
        transaction_service
            .run(transaction_handler, &mut transaction_rx)
            .await;
    });

    http::AppState {
        user_channel: user_tx,
        game_channel: game_tx,
        deposit_channel: deposit_tx,
        withdrawal_channel: withdrawal_tx,
        transaction_channel: transaction_tx,
        sessions,
        notifier: context.notifier,
    }
}

pub async fn start_services(
    ledger: Ledger,
    settings: Settings,
    listen: String,
) -> Result<(), anyhow::Error> {
    let context = ServiceContext {
        ledger,
        locks: UserLocks::new(),
        mailer: Arc::new(mailer::LogMailer::new(&settings.mail)),
        notifier: notifier::Notifier::new(),
        admin_address: settings.mail.admin_address.clone(),
        rng: entropy_rng(),
    };
    let sessions = http::Sessions::new(
        &settings.session.secret,
        std::time::Duration::from_secs(settings.session.max_age_secs),
    );

    let state = spawn_services(context, sessions);

    log::info!("Starting HTTP server.");
    http::start_http_server(state, &listen).await
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn user_locks_serialize_the_same_user() {
        let locks = UserLocks::new();
        let guard = locks.acquire(7).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(7).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        // Other users are unaffected.
        let _other = locks.acquire(8).await;

        drop(guard);
        contender.await.unwrap();
    }
}
