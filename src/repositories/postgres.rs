use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::{game_entry, LedgerStore};
use crate::models::{
    deposits::Deposit,
    games::{Game, LeaderboardEntry, NewGame},
    transactions::{LedgerEntry, Status, Transaction, TransactionType},
    users::{NewUser, User, UserSettings},
    withdrawals::{RecentWithdrawal, Withdrawal, WithdrawalRequest},
};

#[derive(Clone)]
pub struct PgLedger {
    conn: PgPool,
}

impl PgLedger {
    pub fn new(conn: PgPool) -> Self {
        PgLedger { conn }
    }
}

async fn insert_entry(
    conn: &mut PgConnection,
    user_id: i32,
    entry: &LedgerEntry,
) -> Result<Transaction, anyhow::Error> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"INSERT INTO transactions (user_id, kind, amount, status, details)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(user_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount)
    .bind(entry.status.as_str())
    .bind(&entry.details)
    .fetch_one(conn)
    .await?;

    Ok(transaction)
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn get_user(&self, id: i32) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, anyhow::Error> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
                .bind(username)
                .fetch_optional(&self.conn)
                .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn get_user_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = $1")
            .bind(code)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser, opening: LedgerEntry) -> Result<User, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users
            (username, email, password, balance, full_name, referral_code, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.balance)
        .bind(&user.full_name)
        .bind(&user.referral_code)
        .bind(user.referred_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_entry(&mut tx, user.id, &opening).await?;
        tx.commit().await?;

        Ok(user)
    }

    async fn credit_user(&self, user_id: i32, entry: LedgerEntry) -> Result<f64, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let balance: f64 =
            sqlx::query_scalar("UPDATE users SET balance = balance + $2 WHERE id = $1 RETURNING balance")
                .bind(user_id)
                .bind(entry.amount)
                .fetch_one(&mut *tx)
                .await?;

        insert_entry(&mut tx, user_id, &entry).await?;
        tx.commit().await?;

        Ok(balance)
    }

    async fn update_user_settings(
        &self,
        user_id: i32,
        settings: &UserSettings,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users SET
                full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                bank_name = COALESCE($4, bank_name),
                account_number = COALESCE($5, account_number),
                account_name = COALESCE($6, account_name),
                hidden_balance = COALESCE($7, hidden_balance)
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(user_id)
        .bind(&settings.full_name)
        .bind(&settings.email)
        .bind(&settings.bank_name)
        .bind(&settings.account_number)
        .bind(&settings.account_name)
        .bind(settings.hidden_balance)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn update_user_password(&self, user_id: i32, password: &str) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password)
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(())
    }

    async fn record_game(&self, game: NewGame) -> Result<(Game, f64), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let game = sqlx::query_as::<_, Game>(
            r#"INSERT INTO games
            (user_id, bet_amount, selected_number, result_number, is_win, win_amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(game.user_id)
        .bind(game.bet_amount)
        .bind(game.selected_number)
        .bind(game.result_number)
        .bind(game.is_win)
        .bind(game.win_amount)
        .fetch_one(&mut *tx)
        .await?;

        insert_entry(&mut tx, game.user_id, &game_entry(&game)).await?;

        let balance: f64 = sqlx::query_scalar(
            "UPDATE users SET balance = balance - $2 + $3 WHERE id = $1 RETURNING balance",
        )
        .bind(game.user_id)
        .bind(game.bet_amount)
        .bind(game.win_amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((game, balance))
    }

    async fn count_user_games(&self, user_id: i32) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM games WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.conn)
            .await?;

        Ok(count)
    }

    async fn get_user_games(&self, user_id: i32) -> Result<Vec<Game>, anyhow::Error> {
        let games = sqlx::query_as::<_, Game>(
            "SELECT * FROM games WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(games)
    }

    async fn get_user_transactions(&self, user_id: i32) -> Result<Vec<Transaction>, anyhow::Error> {
        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(transactions)
    }

    async fn open_deposit(
        &self,
        user_id: i32,
        amount: f64,
        withdrawal_code: &str,
        details: &str,
    ) -> Result<Deposit, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let transaction = insert_entry(
            &mut tx,
            user_id,
            &LedgerEntry::pending(TransactionType::Deposit, amount, details),
        )
        .await?;

        let deposit = sqlx::query_as::<_, Deposit>(
            r#"INSERT INTO deposits (user_id, transaction_id, amount, status, withdrawal_code)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING *"#,
        )
        .bind(user_id)
        .bind(transaction.id)
        .bind(amount)
        .bind(withdrawal_code)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deposit)
    }

    async fn get_deposit_by_code(&self, code: &str) -> Result<Option<Deposit>, anyhow::Error> {
        let deposit = sqlx::query_as::<_, Deposit>("SELECT * FROM deposits WHERE withdrawal_code = $1")
            .bind(code)
            .fetch_optional(&self.conn)
            .await?;

        Ok(deposit)
    }

    async fn get_user_deposits(&self, user_id: i32) -> Result<Vec<Deposit>, anyhow::Error> {
        let deposits = sqlx::query_as::<_, Deposit>(
            "SELECT * FROM deposits WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    async fn complete_deposit(&self, deposit_id: i32) -> Result<Option<f64>, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        // The status guard makes a second completion a no-op even across nodes.
        let deposit = sqlx::query_as::<_, Deposit>(
            r#"UPDATE deposits SET status = 'completed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status <> 'completed'
            RETURNING *"#,
        )
        .bind(deposit_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(deposit) = deposit else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE transactions SET status = 'completed', updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(deposit.transaction_id)
        .execute(&mut *tx)
        .await?;

        let balance: f64 =
            sqlx::query_scalar("UPDATE users SET balance = balance + $2 WHERE id = $1 RETURNING balance")
                .bind(deposit.user_id)
                .bind(deposit.amount)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Some(balance))
    }

    async fn open_withdrawal(
        &self,
        user_id: i32,
        request: &WithdrawalRequest,
        details: &str,
    ) -> Result<(Withdrawal, f64), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let transaction = insert_entry(
            &mut tx,
            user_id,
            &LedgerEntry::pending(TransactionType::Withdrawal, request.amount, details),
        )
        .await?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"INSERT INTO withdrawals
            (user_id, transaction_id, amount, bank_name, account_number, account_name, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *"#,
        )
        .bind(user_id)
        .bind(transaction.id)
        .bind(request.amount)
        .bind(&request.bank_name)
        .bind(&request.account_number)
        .bind(&request.account_name)
        .fetch_one(&mut *tx)
        .await?;

        let balance: f64 =
            sqlx::query_scalar("UPDATE users SET balance = balance - $2 WHERE id = $1 RETURNING balance")
                .bind(user_id)
                .bind(request.amount)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok((withdrawal, balance))
    }

    async fn get_user_withdrawals(&self, user_id: i32) -> Result<Vec<Withdrawal>, anyhow::Error> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    async fn set_withdrawal_status(
        &self,
        withdrawal_id: i32,
        status: Status,
    ) -> Result<Option<Withdrawal>, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"UPDATE withdrawals SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *"#,
        )
        .bind(status.as_str())
        .bind(withdrawal_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(withdrawal) = &withdrawal {
            sqlx::query(
                "UPDATE transactions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
            )
            .bind(status.as_str())
            .bind(withdrawal.transaction_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(withdrawal)
    }

    async fn get_recent_withdrawals(
        &self,
        limit: i64,
    ) -> Result<Vec<RecentWithdrawal>, anyhow::Error> {
        let withdrawals = sqlx::query_as::<_, RecentWithdrawal>(
            r#"SELECT w.id, u.username, w.amount, w.created_at
            FROM withdrawals w
            JOIN users u ON u.id = w.user_id
            WHERE w.status = 'completed'
            ORDER BY w.created_at DESC, w.id DESC
            LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, anyhow::Error> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"SELECT
                u.id AS user_id,
                u.username,
                COALESCE(SUM(CASE WHEN g.is_win THEN g.win_amount ELSE 0 END), 0)::DOUBLE PRECISION
                    AS total_winnings,
                COUNT(g.id) AS games_played
            FROM users u
            JOIN games g ON g.user_id = u.id
            GROUP BY u.id, u.username
            ORDER BY total_winnings DESC, u.id ASC
            LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(entries)
    }
}
