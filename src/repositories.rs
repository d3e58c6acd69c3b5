use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    deposits::Deposit,
    games::{Game, LeaderboardEntry, NewGame},
    transactions::{LedgerEntry, Status, Transaction, TransactionType},
    users::{NewUser, User, UserSettings},
    withdrawals::{RecentWithdrawal, Withdrawal, WithdrawalRequest},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

pub type Ledger = Arc<dyn LedgerStore>;

/// Persistent records behind the wallet, the spin game and the money workflows.
///
/// Every method that moves a balance also writes the matching transaction row,
/// so implementations can keep the two in step atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    async fn get_user(&self, id: i32) -> Result<Option<User>, anyhow::Error>;

    /// Case-insensitive.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, anyhow::Error>;

    /// Case-insensitive.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    async fn get_user_by_referral_code(&self, code: &str)
        -> Result<Option<User>, anyhow::Error>;

    /// Inserts the user together with its opening ledger entry.
    async fn insert_user(&self, user: NewUser, opening: LedgerEntry) -> Result<User, anyhow::Error>;

    /// Adds `entry.amount` to the balance and records the entry. Returns the new balance.
    async fn credit_user(&self, user_id: i32, entry: LedgerEntry) -> Result<f64, anyhow::Error>;

    async fn update_user_settings(
        &self,
        user_id: i32,
        settings: &UserSettings,
    ) -> Result<Option<User>, anyhow::Error>;

    async fn update_user_password(&self, user_id: i32, password: &str) -> Result<(), anyhow::Error>;

    /// Persists a resolved game, its `game_win`/`game_loss` entry and the settled
    /// balance. Returns the game and the new balance.
    async fn record_game(&self, game: NewGame) -> Result<(Game, f64), anyhow::Error>;

    async fn count_user_games(&self, user_id: i32) -> Result<i64, anyhow::Error>;

    async fn get_user_games(&self, user_id: i32) -> Result<Vec<Game>, anyhow::Error>;

    async fn get_user_transactions(&self, user_id: i32) -> Result<Vec<Transaction>, anyhow::Error>;

    /// Creates a pending deposit transaction and its deposit row.
    async fn open_deposit(
        &self,
        user_id: i32,
        amount: f64,
        withdrawal_code: &str,
        details: &str,
    ) -> Result<Deposit, anyhow::Error>;

    async fn get_deposit_by_code(&self, code: &str) -> Result<Option<Deposit>, anyhow::Error>;

    async fn get_user_deposits(&self, user_id: i32) -> Result<Vec<Deposit>, anyhow::Error>;

    /// Marks the deposit and its transaction completed and credits the user.
    /// Returns `None` when the deposit was already completed.
    async fn complete_deposit(&self, deposit_id: i32) -> Result<Option<f64>, anyhow::Error>;

    /// Creates a pending withdrawal transaction and row and debits the balance.
    async fn open_withdrawal(
        &self,
        user_id: i32,
        request: &WithdrawalRequest,
        details: &str,
    ) -> Result<(Withdrawal, f64), anyhow::Error>;

    async fn get_user_withdrawals(&self, user_id: i32) -> Result<Vec<Withdrawal>, anyhow::Error>;

    /// Sets the status of a withdrawal and its transaction. Balances are not touched.
    async fn set_withdrawal_status(
        &self,
        withdrawal_id: i32,
        status: Status,
    ) -> Result<Option<Withdrawal>, anyhow::Error>;

    /// Completed withdrawals, newest first.
    async fn get_recent_withdrawals(&self, limit: i64)
        -> Result<Vec<RecentWithdrawal>, anyhow::Error>;

    /// Players with at least one game, ranked by summed winnings.
    async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, anyhow::Error>;
}

pub(crate) fn game_entry(game: &Game) -> LedgerEntry {
    if game.is_win {
        LedgerEntry::completed(
            TransactionType::GameWin,
            game.win_amount,
            format!("Game #{} - Win", game.id),
        )
    } else {
        LedgerEntry::completed(
            TransactionType::GameLoss,
            game.bet_amount,
            format!("Game #{} - Loss", game.id),
        )
    }
}
