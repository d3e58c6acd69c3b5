use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{dispatch, ApiJson, AppState, CurrentUser};
use crate::{
    models::{
        deposits::{DepositCode, DepositRequest},
        withdrawals::WithdrawalRequest,
    },
    services::{
        deposits::{self, DepositServiceRequest},
        transactions::TransactionServiceRequest,
        withdrawals::{self, WithdrawalServiceRequest},
        ServiceError,
    },
};

fn check_amount(kind: &str, amount: f64, min: f64, max: f64) -> Result<(), ServiceError> {
    if (min..=max).contains(&amount) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "{} amount must be between ₦{} and ₦{}",
            kind,
            group_thousands(min),
            group_thousands(max)
        )))
    }
}

fn group_thousands(amount: f64) -> String {
    let digits = format!("{:.0}", amount);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn validate_withdrawal(request: &WithdrawalRequest) -> Result<(), ServiceError> {
    check_amount(
        "Withdrawal",
        request.amount,
        withdrawals::MIN_AMOUNT,
        withdrawals::MAX_AMOUNT,
    )?;

    let bank_fields = [
        &request.bank_name,
        &request.account_number,
        &request.account_name,
    ];
    if bank_fields.iter().any(|field| field.trim().is_empty()) {
        return Err(ServiceError::Validation(
            "Bank name, account number and account name are required".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_deposit(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(request): ApiJson<DepositRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    check_amount(
        "Deposit",
        request.amount,
        deposits::MIN_AMOUNT,
        deposits::MAX_AMOUNT,
    )?;

    let receipt = dispatch(&state.deposit_channel, |response| {
        DepositServiceRequest::Create {
            user_id: caller.user_id,
            amount: request.amount,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let deposits = dispatch(&state.deposit_channel, |response| {
        DepositServiceRequest::List {
            user_id: caller.user_id,
            response,
        }
    })
    .await?;

    Ok(Json(deposits))
}

pub async fn verify_deposit(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(code): ApiJson<DepositCode>,
) -> Result<impl IntoResponse, ServiceError> {
    let verified = dispatch(&state.deposit_channel, |response| {
        DepositServiceRequest::Verify {
            user_id: caller.user_id,
            withdrawal_code: code.withdrawal_code,
            response,
        }
    })
    .await?;

    Ok(Json(verified))
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(request): ApiJson<WithdrawalRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_withdrawal(&request)?;

    let receipt = dispatch(&state.withdrawal_channel, |response| {
        WithdrawalServiceRequest::Create {
            user_id: caller.user_id,
            request,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let withdrawals = dispatch(&state.withdrawal_channel, |response| {
        WithdrawalServiceRequest::List {
            user_id: caller.user_id,
            response,
        }
    })
    .await?;

    Ok(Json(withdrawals))
}

pub async fn recent_withdrawals(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let withdrawals = dispatch(&state.withdrawal_channel, |response| {
        WithdrawalServiceRequest::Recent { response }
    })
    .await?;

    Ok(Json(withdrawals))
}

pub async fn transactions(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let transactions = dispatch(&state.transaction_channel, |response| {
        TransactionServiceRequest::List {
            user_id: caller.user_id,
            response,
        }
    })
    .await?;

    Ok(Json(transactions))
}
