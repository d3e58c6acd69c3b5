use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{
    generate_code,
    mailer::{send_best_effort, Email},
    RequestHandler, Responder, Service, ServiceContext, ServiceError,
};
use crate::{
    models::{
        transactions::{LedgerEntry, Status, TransactionType},
        users::NewUser,
        withdrawals::{RecentWithdrawal, Withdrawal, WithdrawalReceipt, WithdrawalRequest},
    },
    repositories::Ledger,
};

pub const MIN_AMOUNT: f64 = 1000.0;
pub const MAX_AMOUNT: f64 = 500_000.0;
const RECENT_FEED_SIZE: i64 = 10;

pub enum WithdrawalServiceRequest {
    Create {
        user_id: i32,
        request: WithdrawalRequest,
        response: Responder<WithdrawalReceipt>,
    },
    List {
        user_id: i32,
        response: Responder<Vec<Withdrawal>>,
    },
    Recent {
        response: Responder<Vec<RecentWithdrawal>>,
    },
}

#[derive(Clone)]
pub struct WithdrawalRequestHandler {
    context: ServiceContext,
}

impl WithdrawalRequestHandler {
    pub fn new(context: ServiceContext) -> Self {
        WithdrawalRequestHandler { context }
    }

    async fn create(
        &self,
        user_id: i32,
        request: WithdrawalRequest,
    ) -> Result<WithdrawalReceipt, ServiceError> {
        let ledger = &self.context.ledger;
        let guard = self.context.locks.acquire(user_id).await;

        let user = ledger
            .get_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        if request.amount > user.balance {
            return Err(ServiceError::InsufficientBalance);
        }

        let (withdrawal, new_balance) = ledger
            .open_withdrawal(
                user_id,
                &request,
                "Manual withdrawal - pending admin approval",
            )
            .await
            .map_err(ServiceError::database)?;
        drop(guard);

        log::info!(
            "Opened withdrawal {} of {:.2} for user {} (balance {:.2})",
            withdrawal.id,
            withdrawal.amount,
            user_id,
            new_balance
        );

        send_best_effort(
            self.context.mailer.as_ref(),
            Email::new(
                &self.context.admin_address,
                "Withdrawal Request",
                format!(
                    "Withdrawal Request Details:\nAmount: ₦{:.2}\nBank: {}\nAccount: {}\n\
                     Account Name: {}\nUsername: {}\nEmail: {}\nBalance: ₦{:.2}",
                    withdrawal.amount,
                    withdrawal.bank_name,
                    withdrawal.account_number,
                    withdrawal.account_name,
                    user.username,
                    user.email,
                    new_balance
                ),
            ),
        )
        .await;

        Ok(WithdrawalReceipt {
            id: withdrawal.id,
            amount: withdrawal.amount,
            status: withdrawal.status,
            created_at: withdrawal.created_at,
            new_balance,
        })
    }

    async fn list(&self, user_id: i32) -> Result<Vec<Withdrawal>, ServiceError> {
        self.context
            .ledger
            .get_user_withdrawals(user_id)
            .await
            .map_err(ServiceError::database)
    }

    async fn recent(&self) -> Result<Vec<RecentWithdrawal>, ServiceError> {
        self.context
            .ledger
            .get_recent_withdrawals(RECENT_FEED_SIZE)
            .await
            .map_err(ServiceError::database)
    }
}

/// Admin transition for a withdrawal and its ledger entry. Rejecting a
/// withdrawal does not return the debited funds.
pub async fn update_status(
    ledger: &Ledger,
    withdrawal_id: i32,
    status: Status,
) -> Result<Withdrawal, ServiceError> {
    let withdrawal = ledger
        .set_withdrawal_status(withdrawal_id, status)
        .await
        .map_err(ServiceError::database)?
        .ok_or_else(|| ServiceError::NotFound("Withdrawal not found".to_string()))?;

    log::info!("Withdrawal {} is now {}", withdrawal.id, withdrawal.status);
    Ok(withdrawal)
}

const DEMO_NAMES: &[&str] = &[
    "James", "Sarah", "Emeka", "Fatima", "Oluwole", "Chioma", "Ahmed", "Ngozi", "Emmanuel",
    "Aisha", "Tunde", "Blessing", "Yusuf", "Amina", "Victor",
];
const DEMO_AMOUNTS: &[f64] = &[
    5000.0, 10000.0, 15000.0, 20000.0, 25000.0, 30000.0, 40000.0, 50000.0, 75000.0, 100000.0,
];
const DEMO_BALANCE: f64 = 10000.0;

/// Fills the public withdrawal feed with completed withdrawals by throwaway
/// accounts that cannot log in. Returns how many were created.
pub async fn seed_demo_withdrawals(ledger: &Ledger, count: usize) -> Result<usize, anyhow::Error> {
    let mut seeded = 0;

    while seeded < count {
        let (name, amount) = {
            let mut rng = rand::thread_rng();
            (
                DEMO_NAMES.choose(&mut rng).copied().unwrap_or("Player"),
                DEMO_AMOUNTS.choose(&mut rng).copied().unwrap_or(MIN_AMOUNT),
            )
        };
        let suffix = generate_code();
        if ledger.get_user_by_referral_code(&suffix).await?.is_some() {
            continue;
        }

        let user = ledger
            .insert_user(
                NewUser {
                    username: format!("{}{}", name, suffix),
                    email: format!("{}{}@example.com", name.to_lowercase(), suffix.to_lowercase()),
                    // Not a valid hash, so the account never authenticates.
                    password: "!".to_string(),
                    full_name: Some(format!("{} User", name)),
                    referral_code: suffix,
                    referred_by: None,
                    balance: DEMO_BALANCE + amount,
                },
                LedgerEntry::completed(
                    TransactionType::SignupBonus,
                    DEMO_BALANCE + amount,
                    "Demo account",
                ),
            )
            .await?;

        let (withdrawal, _) = ledger
            .open_withdrawal(
                user.id,
                &WithdrawalRequest {
                    amount,
                    bank_name: "Bank Name".to_string(),
                    account_number: "1234567890".to_string(),
                    account_name: format!("{} User", name),
                },
                "Simulated withdrawal",
            )
            .await?;
        ledger
            .set_withdrawal_status(withdrawal.id, Status::Completed)
            .await?;

        seeded += 1;
    }

    log::info!("Seeded {} demo withdrawals", seeded);
    Ok(seeded)
}

#[async_trait]
impl RequestHandler<WithdrawalServiceRequest> for WithdrawalRequestHandler {
    async fn handle_request(&self, request: WithdrawalServiceRequest) {
        match request {
            WithdrawalServiceRequest::Create {
                user_id,
                request,
                response,
            } => {
                let receipt = self.create(user_id, request).await;
                let _ = response.send(receipt);
            }
            WithdrawalServiceRequest::List { user_id, response } => {
                let withdrawals = self.list(user_id).await;
                let _ = response.send(withdrawals);
            }
            WithdrawalServiceRequest::Recent { response } => {
                let withdrawals = self.recent().await;
                let _ = response.send(withdrawals);
            }
        }
    }
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn new() -> Self {
        WithdrawalService {}
    }
}

#[async_trait]
impl Service<WithdrawalServiceRequest, WithdrawalRequestHandler> for WithdrawalService {}
