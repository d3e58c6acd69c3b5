use serde::{Deserialize, Serialize};

use super::transactions::Status;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: i32,
    pub user_id: i32,
    pub transaction_id: i32,
    pub amount: f64,
    #[sqlx(try_from = "String")]
    pub status: Status,
    #[serde(skip_serializing)]
    pub withdrawal_code: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCode {
    #[serde(default)]
    pub withdrawal_code: String,
}

/// What the depositor sees; the withdrawal code stays with the admin.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub id: i32,
    pub amount: f64,
    pub status: Status,
    pub created_at: chrono::NaiveDateTime,
}

impl From<&Deposit> for DepositReceipt {
    fn from(deposit: &Deposit) -> Self {
        DepositReceipt {
            id: deposit.id,
            amount: deposit.amount,
            status: deposit.status,
            created_at: deposit.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDeposit {
    pub message: String,
    pub new_balance: f64,
}
