use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    GameWin,
    GameLoss,
    ReferralBonus,
    SignupBonus,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::GameWin => "game_win",
            TransactionType::GameLoss => "game_loss",
            TransactionType::ReferralBonus => "referral_bonus",
            TransactionType::SignupBonus => "signup_bonus",
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "game_win" => Ok(TransactionType::GameWin),
            "game_loss" => Ok(TransactionType::GameLoss),
            "referral_bonus" => Ok(TransactionType::ReferralBonus),
            "signup_bonus" => Ok(TransactionType::SignupBonus),
            _ => Err(UnknownVariant {
                kind: "transaction type",
                value,
            }),
        }
    }
}

/// Lifecycle shared by transactions, deposits and withdrawals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Completed,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Status::try_from(value.to_string())
    }
}

impl TryFrom<String> for Status {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" => Ok(Status::Completed),
            "cancelled" => Ok(Status::Cancelled),
            _ => Err(UnknownVariant {
                kind: "status",
                value,
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: TransactionType,
    pub amount: f64,
    #[sqlx(try_from = "String")]
    pub status: Status,
    pub details: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// A ledger line waiting to be attached to a user.
#[derive(Clone, Debug)]
pub struct LedgerEntry {
    pub kind: TransactionType,
    pub amount: f64,
    pub status: Status,
    pub details: String,
}

impl LedgerEntry {
    pub fn completed(kind: TransactionType, amount: f64, details: impl Into<String>) -> Self {
        LedgerEntry {
            kind,
            amount,
            status: Status::Completed,
            details: details.into(),
        }
    }

    pub fn pending(kind: TransactionType, amount: f64, details: impl Into<String>) -> Self {
        LedgerEntry {
            kind,
            amount,
            status: Status::Pending,
            details: details.into(),
        }
    }
}
