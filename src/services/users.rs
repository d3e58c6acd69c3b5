use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    generate_code,
    mailer::{send_best_effort, Email},
    password::{hash_password, verify_password},
    RequestHandler, Responder, Service, ServiceContext, ServiceError,
};
use crate::models::{
    transactions::{LedgerEntry, TransactionType},
    users::{Credentials, NewUser, PasswordChange, Registration, User, UserSettings},
};

pub const SIGNUP_BONUS: f64 = 2000.0;
pub const REFERRAL_BONUS: f64 = 1500.0;

pub enum UserRequest {
    Register {
        registration: Registration,
        response: Responder<User>,
    },
    Login {
        credentials: Credentials,
        response: Responder<User>,
    },
    GetUser {
        user_id: i32,
        response: Responder<User>,
    },
    UpdateSettings {
        user_id: i32,
        settings: UserSettings,
        response: Responder<User>,
    },
    ChangePassword {
        user_id: i32,
        change: PasswordChange,
        response: Responder<()>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    context: ServiceContext,
    /// Held from the uniqueness checks until the account row is written.
    accounts: Arc<Mutex<()>>,
}

impl UserRequestHandler {
    pub fn new(context: ServiceContext) -> Self {
        UserRequestHandler {
            context,
            accounts: Arc::new(Mutex::new(())),
        }
    }

    async fn unused_referral_code(&self) -> Result<String, ServiceError> {
        loop {
            let code = generate_code();
            let taken = self
                .context
                .ledger
                .get_user_by_referral_code(&code)
                .await
                .map_err(ServiceError::database)?;
            if taken.is_none() {
                return Ok(code);
            }
        }
    }

    async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        let ledger = &self.context.ledger;
        let accounts = self.accounts.lock().await;

        if ledger
            .get_user_by_username(&registration.username)
            .await
            .map_err(ServiceError::database)?
            .is_some()
        {
            return Err(ServiceError::Validation("Username already exists".to_string()));
        }
        if ledger
            .get_user_by_email(&registration.email)
            .await
            .map_err(ServiceError::database)?
            .is_some()
        {
            return Err(ServiceError::Validation("Email already exists".to_string()));
        }

        let referrer = match registration
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            Some(code) => ledger
                .get_user_by_referral_code(code)
                .await
                .map_err(ServiceError::database)?,
            None => None,
        };

        let new_user = NewUser {
            username: registration.username,
            email: registration.email,
            password: hash_password(&registration.password),
            full_name: registration.full_name,
            referral_code: self.unused_referral_code().await?,
            referred_by: referrer.as_ref().map(|referrer| referrer.id),
            balance: SIGNUP_BONUS,
        };
        let user = ledger
            .insert_user(
                new_user,
                LedgerEntry::completed(
                    TransactionType::SignupBonus,
                    SIGNUP_BONUS,
                    "Welcome bonus for new account",
                ),
            )
            .await
            .map_err(ServiceError::database)?;
        drop(accounts);
        log::info!("Registered user {} ({})", user.id, user.username);

        if let Some(referrer) = referrer {
            let _guard = self.context.locks.acquire(referrer.id).await;
            let credited = ledger
                .credit_user(
                    referrer.id,
                    LedgerEntry::completed(
                        TransactionType::ReferralBonus,
                        REFERRAL_BONUS,
                        format!("Referral bonus for referring {}", user.username),
                    ),
                )
                .await;
            match credited {
                Ok(balance) => log::info!(
                    "Credited referral bonus to user {} (balance {:.2})",
                    referrer.id,
                    balance
                ),
                Err(e) => log::error!(
                    "Could not credit referral bonus to user {}: {:#}",
                    referrer.id,
                    e
                ),
            }
        }

        send_best_effort(
            self.context.mailer.as_ref(),
            Email::new(
                &user.email,
                "Welcome to SpinBet!",
                format!(
                    "Welcome to SpinBet! Your account has been successfully created. \
                     Your referral code is: {}. Share it with your friends and earn \
                     ₦{:.0} for each referral!",
                    user.referral_code, REFERRAL_BONUS
                ),
            ),
        )
        .await;

        Ok(user)
    }

    async fn login(&self, credentials: Credentials) -> Result<User, ServiceError> {
        let user = self
            .context
            .ledger
            .get_user_by_username(&credentials.username)
            .await
            .map_err(ServiceError::database)?
            .filter(|user| verify_password(&credentials.password, &user.password))
            .ok_or(ServiceError::InvalidCredentials)?;

        send_best_effort(
            self.context.mailer.as_ref(),
            Email::new(
                &user.email,
                "New Login Alert - SpinBet",
                "A new login was detected on your SpinBet account. \
                 If this wasn't you, please change your password immediately.",
            ),
        )
        .await;

        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Result<User, ServiceError> {
        self.context
            .ledger
            .get_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    async fn update_settings(
        &self,
        user_id: i32,
        settings: UserSettings,
    ) -> Result<User, ServiceError> {
        let ledger = &self.context.ledger;
        let accounts = self.accounts.lock().await;

        if let Some(email) = &settings.email {
            let owner = ledger
                .get_user_by_email(email)
                .await
                .map_err(ServiceError::database)?;
            if owner.is_some_and(|owner| owner.id != user_id) {
                return Err(ServiceError::Validation("Email already exists".to_string()));
            }
        }

        let user = ledger
            .update_user_settings(user_id, &settings)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        drop(accounts);

        if settings.has_bank_details() {
            send_best_effort(
                self.context.mailer.as_ref(),
                Email::new(
                    &self.context.admin_address,
                    "User Added Bank Details",
                    format!(
                        "User ID: {}\nUsername: {}\nBank: {}\nAccount: {}\nAccount Name: {}",
                        user.id,
                        user.username,
                        user.bank_name.as_deref().unwrap_or_default(),
                        user.account_number.as_deref().unwrap_or_default(),
                        user.account_name.as_deref().unwrap_or_default(),
                    ),
                ),
            )
            .await;
        }

        Ok(user)
    }

    async fn change_password(
        &self,
        user_id: i32,
        change: PasswordChange,
    ) -> Result<(), ServiceError> {
        let user = self.get_user(user_id).await?;

        if !verify_password(&change.current_password, &user.password) {
            return Err(ServiceError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        self.context
            .ledger
            .update_user_password(user_id, &hash_password(&change.new_password))
            .await
            .map_err(ServiceError::database)
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register {
                registration,
                response,
            } => {
                let user = self.register(registration).await;
                let _ = response.send(user);
            }
            UserRequest::Login {
                credentials,
                response,
            } => {
                let user = self.login(credentials).await;
                let _ = response.send(user);
            }
            UserRequest::GetUser { user_id, response } => {
                let user = self.get_user(user_id).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateSettings {
                user_id,
                settings,
                response,
            } => {
                let user = self.update_settings(user_id, settings).await;
                let _ = response.send(user);
            }
            UserRequest::ChangePassword {
                user_id,
                change,
                response,
            } => {
                let result = self.change_password(user_id, change).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
