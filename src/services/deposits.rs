//! Manual bank-transfer deposits.
//!
//! A deposit starts pending with a one-time code that only the admin receives.
//! Once the admin has seen the money arrive they hand the code to the player,
//! who submits it to complete the deposit and credit their balance.

use async_trait::async_trait;

use super::{
    generate_code,
    mailer::{send_best_effort, Email},
    RequestHandler, Responder, Service, ServiceContext, ServiceError,
};
use crate::models::{
    deposits::{Deposit, DepositReceipt, VerifiedDeposit},
    transactions::Status,
};

pub const MIN_AMOUNT: f64 = 1000.0;
pub const MAX_AMOUNT: f64 = 500_000.0;

pub enum DepositServiceRequest {
    Create {
        user_id: i32,
        amount: f64,
        response: Responder<DepositReceipt>,
    },
    Verify {
        user_id: i32,
        withdrawal_code: String,
        response: Responder<VerifiedDeposit>,
    },
    List {
        user_id: i32,
        response: Responder<Vec<Deposit>>,
    },
}

#[derive(Clone)]
pub struct DepositRequestHandler {
    context: ServiceContext,
}

impl DepositRequestHandler {
    pub fn new(context: ServiceContext) -> Self {
        DepositRequestHandler { context }
    }

    async fn unused_withdrawal_code(&self) -> Result<String, ServiceError> {
        loop {
            let code = generate_code();
            let taken = self
                .context
                .ledger
                .get_deposit_by_code(&code)
                .await
                .map_err(ServiceError::database)?;
            if taken.is_none() {
                return Ok(code);
            }
        }
    }

    async fn create(&self, user_id: i32, amount: f64) -> Result<DepositReceipt, ServiceError> {
        let ledger = &self.context.ledger;

        ledger
            .get_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let withdrawal_code = self.unused_withdrawal_code().await?;
        let deposit = ledger
            .open_deposit(
                user_id,
                amount,
                &withdrawal_code,
                "Manual deposit - pending admin approval",
            )
            .await
            .map_err(ServiceError::database)?;
        log::info!(
            "Opened deposit {} of {:.2} for user {}",
            deposit.id,
            amount,
            user_id
        );

        send_best_effort(
            self.context.mailer.as_ref(),
            Email::new(
                &self.context.admin_address,
                format!("Deposit Request - One-time Withdrawal Code: {}", withdrawal_code),
                format!(
                    "A user has made a deposit request.\nAmount: ₦{:.2}\nUser ID: {}\n\
                     One-time withdrawal code: {}",
                    amount, user_id, withdrawal_code
                ),
            ),
        )
        .await;

        Ok(DepositReceipt::from(&deposit))
    }

    async fn verify(
        &self,
        user_id: i32,
        withdrawal_code: String,
    ) -> Result<VerifiedDeposit, ServiceError> {
        let withdrawal_code = withdrawal_code.trim();
        if withdrawal_code.is_empty() {
            return Err(ServiceError::Validation(
                "Withdrawal code is required".to_string(),
            ));
        }

        let ledger = &self.context.ledger;
        let _guard = self.context.locks.acquire(user_id).await;

        let deposit = ledger
            .get_deposit_by_code(withdrawal_code)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("Invalid withdrawal code".to_string()))?;

        if deposit.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Withdrawal code does not belong to this user".to_string(),
            ));
        }

        let already_processed =
            || ServiceError::AlreadyProcessed("Deposit has already been processed".to_string());
        if deposit.status == Status::Completed {
            return Err(already_processed());
        }

        let new_balance = ledger
            .complete_deposit(deposit.id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(already_processed)?;
        log::info!(
            "Completed deposit {} of {:.2} for user {}",
            deposit.id,
            deposit.amount,
            user_id
        );

        Ok(VerifiedDeposit {
            message: "Deposit verified successfully".to_string(),
            new_balance,
        })
    }

    async fn list(&self, user_id: i32) -> Result<Vec<Deposit>, ServiceError> {
        self.context
            .ledger
            .get_user_deposits(user_id)
            .await
            .map_err(ServiceError::database)
    }
}

#[async_trait]
impl RequestHandler<DepositServiceRequest> for DepositRequestHandler {
    async fn handle_request(&self, request: DepositServiceRequest) {
        match request {
            DepositServiceRequest::Create {
                user_id,
                amount,
                response,
            } => {
                let receipt = self.create(user_id, amount).await;
                let _ = response.send(receipt);
            }
            DepositServiceRequest::Verify {
                user_id,
                withdrawal_code,
                response,
            } => {
                let verified = self.verify(user_id, withdrawal_code).await;
                let _ = response.send(verified);
            }
            DepositServiceRequest::List { user_id, response } => {
                let deposits = self.list(user_id).await;
                let _ = response.send(deposits);
            }
        }
    }
}

pub struct DepositService;

impl DepositService {
    pub fn new() -> Self {
        DepositService {}
    }
}

#[async_trait]
impl Service<DepositServiceRequest, DepositRequestHandler> for DepositService {}
