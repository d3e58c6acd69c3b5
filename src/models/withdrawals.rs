use serde::{Deserialize, Serialize};

use super::transactions::Status;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: i32,
    pub user_id: i32,
    pub transaction_id: i32,
    pub amount: f64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    #[sqlx(try_from = "String")]
    pub status: Status,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: f64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
    pub id: i32,
    pub amount: f64,
    pub status: Status,
    pub created_at: chrono::NaiveDateTime,
    pub new_balance: f64,
}

/// Public feed row; carries no bank details.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentWithdrawal {
    pub id: i32,
    pub username: String,
    pub amount: f64,
    pub created_at: chrono::NaiveDateTime,
}
