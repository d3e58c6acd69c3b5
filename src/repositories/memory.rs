use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tokio::sync::RwLock;

use super::{game_entry, LedgerStore};
use crate::models::{
    deposits::Deposit,
    games::{Game, LeaderboardEntry, NewGame},
    transactions::{LedgerEntry, Status, Transaction, TransactionType},
    users::{NewUser, User, UserSettings},
    withdrawals::{RecentWithdrawal, Withdrawal, WithdrawalRequest},
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    games: BTreeMap<i32, Game>,
    transactions: BTreeMap<i32, Transaction>,
    deposits: BTreeMap<i32, Deposit>,
    withdrawals: BTreeMap<i32, Withdrawal>,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn next_id<V>(table: &BTreeMap<i32, V>) -> i32 {
    table.keys().next_back().map_or(1, |id| id + 1)
}

impl Tables {
    fn user_mut(&mut self, id: i32) -> Result<&mut User, anyhow::Error> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| anyhow!("User {} not found", id))
    }

    fn push_entry(&mut self, user_id: i32, entry: LedgerEntry) -> Transaction {
        let created_at = now();
        let transaction = Transaction {
            id: next_id(&self.transactions),
            user_id,
            kind: entry.kind,
            amount: entry.amount,
            status: entry.status,
            details: Some(entry.details),
            created_at,
            updated_at: created_at,
        };
        self.transactions.insert(transaction.id, transaction.clone());
        transaction
    }

    fn set_transaction_status(&mut self, id: i32, status: Status) {
        if let Some(transaction) = self.transactions.get_mut(&id) {
            transaction.status = status;
            transaction.updated_at = now();
        }
    }
}

/// Process-local ledger for development runs and tests. Rows live as long as
/// the process does.
#[derive(Default)]
pub struct MemoryLedger {
    tables: RwLock<Tables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get_user(&self, id: i32) -> Result<Option<User>, anyhow::Error> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.referral_code == code)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser, opening: LedgerEntry) -> Result<User, anyhow::Error> {
        let mut tables = self.tables.write().await;

        for existing in tables.users.values() {
            if existing.username.eq_ignore_ascii_case(&user.username) {
                bail!("Duplicate username: {}", user.username);
            }
            if existing.email.eq_ignore_ascii_case(&user.email) {
                bail!("Duplicate email: {}", user.email);
            }
            if existing.referral_code == user.referral_code {
                bail!("Duplicate referral code: {}", user.referral_code);
            }
        }

        let user = User {
            id: next_id(&tables.users),
            username: user.username,
            email: user.email,
            password: user.password,
            balance: user.balance,
            full_name: user.full_name,
            referral_code: user.referral_code,
            referred_by: user.referred_by,
            hidden_balance: false,
            bank_name: None,
            account_number: None,
            account_name: None,
            created_at: now(),
        };
        tables.users.insert(user.id, user.clone());
        tables.push_entry(user.id, opening);

        Ok(user)
    }

    async fn credit_user(&self, user_id: i32, entry: LedgerEntry) -> Result<f64, anyhow::Error> {
        let mut tables = self.tables.write().await;

        let user = tables.user_mut(user_id)?;
        user.balance += entry.amount;
        let balance = user.balance;
        tables.push_entry(user_id, entry);

        Ok(balance)
    }

    async fn update_user_settings(
        &self,
        user_id: i32,
        settings: &UserSettings,
    ) -> Result<Option<User>, anyhow::Error> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };

        if let Some(full_name) = &settings.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(email) = &settings.email {
            user.email = email.clone();
        }
        if let Some(bank_name) = &settings.bank_name {
            user.bank_name = Some(bank_name.clone());
        }
        if let Some(account_number) = &settings.account_number {
            user.account_number = Some(account_number.clone());
        }
        if let Some(account_name) = &settings.account_name {
            user.account_name = Some(account_name.clone());
        }
        if let Some(hidden_balance) = settings.hidden_balance {
            user.hidden_balance = hidden_balance;
        }

        Ok(Some(user.clone()))
    }

    async fn update_user_password(&self, user_id: i32, password: &str) -> Result<(), anyhow::Error> {
        let mut tables = self.tables.write().await;
        tables.user_mut(user_id)?.password = password.to_string();
        Ok(())
    }

    async fn record_game(&self, game: NewGame) -> Result<(Game, f64), anyhow::Error> {
        let mut tables = self.tables.write().await;

        let user = tables.user_mut(game.user_id)?;
        user.balance = user.balance - game.bet_amount + game.win_amount;
        let balance = user.balance;

        let game = Game {
            id: next_id(&tables.games),
            user_id: game.user_id,
            bet_amount: game.bet_amount,
            selected_number: game.selected_number,
            result_number: game.result_number,
            is_win: game.is_win,
            win_amount: game.win_amount,
            created_at: now(),
        };
        tables.games.insert(game.id, game.clone());
        tables.push_entry(game.user_id, game_entry(&game));

        Ok((game, balance))
    }

    async fn count_user_games(&self, user_id: i32) -> Result<i64, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .games
            .values()
            .filter(|game| game.user_id == user_id)
            .count() as i64)
    }

    async fn get_user_games(&self, user_id: i32) -> Result<Vec<Game>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .games
            .values()
            .rev()
            .filter(|game| game.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_user_transactions(&self, user_id: i32) -> Result<Vec<Transaction>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .rev()
            .filter(|transaction| transaction.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn open_deposit(
        &self,
        user_id: i32,
        amount: f64,
        withdrawal_code: &str,
        details: &str,
    ) -> Result<Deposit, anyhow::Error> {
        let mut tables = self.tables.write().await;

        if tables
            .deposits
            .values()
            .any(|deposit| deposit.withdrawal_code.as_deref() == Some(withdrawal_code))
        {
            bail!("Duplicate withdrawal code");
        }

        let transaction = tables.push_entry(
            user_id,
            LedgerEntry::pending(TransactionType::Deposit, amount, details),
        );
        let deposit = Deposit {
            id: next_id(&tables.deposits),
            user_id,
            transaction_id: transaction.id,
            amount,
            status: Status::Pending,
            withdrawal_code: Some(withdrawal_code.to_string()),
            created_at: transaction.created_at,
            updated_at: transaction.created_at,
        };
        tables.deposits.insert(deposit.id, deposit.clone());

        Ok(deposit)
    }

    async fn get_deposit_by_code(&self, code: &str) -> Result<Option<Deposit>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .deposits
            .values()
            .find(|deposit| deposit.withdrawal_code.as_deref() == Some(code))
            .cloned())
    }

    async fn get_user_deposits(&self, user_id: i32) -> Result<Vec<Deposit>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .deposits
            .values()
            .rev()
            .filter(|deposit| deposit.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn complete_deposit(&self, deposit_id: i32) -> Result<Option<f64>, anyhow::Error> {
        let mut tables = self.tables.write().await;

        let deposit = tables
            .deposits
            .get_mut(&deposit_id)
            .ok_or_else(|| anyhow!("Deposit {} not found", deposit_id))?;
        if deposit.status == Status::Completed {
            return Ok(None);
        }
        deposit.status = Status::Completed;
        deposit.updated_at = now();
        let (user_id, transaction_id, amount) =
            (deposit.user_id, deposit.transaction_id, deposit.amount);

        tables.set_transaction_status(transaction_id, Status::Completed);
        let user = tables.user_mut(user_id)?;
        user.balance += amount;

        Ok(Some(user.balance))
    }

    async fn open_withdrawal(
        &self,
        user_id: i32,
        request: &WithdrawalRequest,
        details: &str,
    ) -> Result<(Withdrawal, f64), anyhow::Error> {
        let mut tables = self.tables.write().await;

        let user = tables.user_mut(user_id)?;
        user.balance -= request.amount;
        let balance = user.balance;

        let transaction = tables.push_entry(
            user_id,
            LedgerEntry::pending(TransactionType::Withdrawal, request.amount, details),
        );
        let withdrawal = Withdrawal {
            id: next_id(&tables.withdrawals),
            user_id,
            transaction_id: transaction.id,
            amount: request.amount,
            bank_name: request.bank_name.clone(),
            account_number: request.account_number.clone(),
            account_name: request.account_name.clone(),
            status: Status::Pending,
            created_at: transaction.created_at,
            updated_at: transaction.created_at,
        };
        tables.withdrawals.insert(withdrawal.id, withdrawal.clone());

        Ok((withdrawal, balance))
    }

    async fn get_user_withdrawals(&self, user_id: i32) -> Result<Vec<Withdrawal>, anyhow::Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .withdrawals
            .values()
            .rev()
            .filter(|withdrawal| withdrawal.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_withdrawal_status(
        &self,
        withdrawal_id: i32,
        status: Status,
    ) -> Result<Option<Withdrawal>, anyhow::Error> {
        let mut tables = self.tables.write().await;

        let Some(withdrawal) = tables.withdrawals.get_mut(&withdrawal_id) else {
            return Ok(None);
        };
        withdrawal.status = status;
        withdrawal.updated_at = now();
        let withdrawal = withdrawal.clone();

        tables.set_transaction_status(withdrawal.transaction_id, status);

        Ok(Some(withdrawal))
    }

    async fn get_recent_withdrawals(
        &self,
        limit: i64,
    ) -> Result<Vec<RecentWithdrawal>, anyhow::Error> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        let mut completed: Vec<&Withdrawal> = tables
            .withdrawals
            .values()
            .filter(|withdrawal| withdrawal.status == Status::Completed)
            .collect();
        completed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(completed
            .into_iter()
            .take(limit)
            .map(|withdrawal| RecentWithdrawal {
                id: withdrawal.id,
                username: tables
                    .users
                    .get(&withdrawal.user_id)
                    .map_or_else(|| "Unknown User".to_string(), |user| user.username.clone()),
                amount: withdrawal.amount,
                created_at: withdrawal.created_at,
            })
            .collect())
    }

    async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, anyhow::Error> {
        let tables = self.tables.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        let mut totals: BTreeMap<i32, (f64, i64)> = BTreeMap::new();
        for game in tables.games.values() {
            let (winnings, played) = totals.entry(game.user_id).or_default();
            if game.is_win {
                *winnings += game.win_amount;
            }
            *played += 1;
        }

        let mut entries: Vec<LeaderboardEntry> = totals
            .into_iter()
            .filter_map(|(user_id, (total_winnings, games_played))| {
                tables.users.get(&user_id).map(|user| LeaderboardEntry {
                    user_id,
                    username: user.username.clone(),
                    total_winnings,
                    games_played,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_winnings
                .total_cmp(&a.total_winnings)
                .then(a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);

        Ok(entries)
    }
}
