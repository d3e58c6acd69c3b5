use async_trait::async_trait;
use chrono::Utc;

use super::{
    mailer::{send_best_effort, Email},
    notifier::ServerEvent,
    RequestHandler, Responder, Service, ServiceContext, ServiceError,
};
use crate::{
    game,
    models::games::{Bet, Game, GameOutcome, LeaderboardEntry, NewGame},
};

const LEADERBOARD_SIZE: i64 = 10;

pub enum GameRequest {
    Play {
        user_id: i32,
        bet: Bet,
        response: Responder<GameOutcome>,
    },
    History {
        user_id: i32,
        response: Responder<Vec<Game>>,
    },
    Leaderboard {
        response: Responder<Vec<LeaderboardEntry>>,
    },
}

#[derive(Clone)]
pub struct GameRequestHandler {
    context: ServiceContext,
}

impl GameRequestHandler {
    pub fn new(context: ServiceContext) -> Self {
        GameRequestHandler { context }
    }

    async fn play(&self, user_id: i32, bet: Bet) -> Result<GameOutcome, ServiceError> {
        let ledger = &self.context.ledger;
        let guard = self.context.locks.acquire(user_id).await;

        let user = ledger
            .get_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        if bet.bet_amount > user.balance {
            return Err(ServiceError::InsufficientBalance);
        }

        let first_game = ledger
            .count_user_games(user_id)
            .await
            .map_err(ServiceError::database)?
            == 0;

        let spin = {
            let mut rng = self
                .context
                .rng
                .lock()
                .map_err(|_| ServiceError::Internal("RNG lock poisoned".to_string()))?;
            game::spin(bet.selected_number, bet.bet_amount, first_game, &mut *rng)
        };

        let (game, new_balance) = ledger
            .record_game(NewGame {
                user_id,
                bet_amount: bet.bet_amount,
                selected_number: bet.selected_number,
                result_number: spin.result_number,
                is_win: spin.is_win,
                win_amount: spin.win_amount,
            })
            .await
            .map_err(ServiceError::database)?;
        drop(guard);

        log::info!(
            "Game {} for user {}: picked {}, landed {}, balance {:.2}",
            game.id,
            user_id,
            game.selected_number,
            game.result_number,
            new_balance
        );

        if spin.is_win {
            send_best_effort(
                self.context.mailer.as_ref(),
                Email::new(
                    &user.email,
                    "Congratulations! You won on SpinBet!",
                    format!(
                        "Congratulations! You won ₦{:.2} on your recent game.",
                        spin.win_amount
                    ),
                ),
            )
            .await;
        }

        if spin.is_big_win() {
            let delivered = self.context.notifier.broadcast(&ServerEvent::BigWin {
                username: user.username.clone(),
                amount: spin.win_amount,
                timestamp: Utc::now(),
            });
            log::debug!("Big win by {} sent to {} viewers", user.username, delivered);
        }

        Ok(GameOutcome { game, new_balance })
    }

    async fn history(&self, user_id: i32) -> Result<Vec<Game>, ServiceError> {
        self.context
            .ledger
            .get_user_games(user_id)
            .await
            .map_err(ServiceError::database)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        self.context
            .ledger
            .get_leaderboard(LEADERBOARD_SIZE)
            .await
            .map_err(ServiceError::database)
    }
}

#[async_trait]
impl RequestHandler<GameRequest> for GameRequestHandler {
    async fn handle_request(&self, request: GameRequest) {
        match request {
            GameRequest::Play {
                user_id,
                bet,
                response,
            } => {
                let outcome = self.play(user_id, bet).await;
                let _ = response.send(outcome);
            }
            GameRequest::History { user_id, response } => {
                let games = self.history(user_id).await;
                let _ = response.send(games);
            }
            GameRequest::Leaderboard { response } => {
                let entries = self.leaderboard().await;
                let _ = response.send(entries);
            }
        }
    }
}

pub struct GameService;

impl GameService {
    pub fn new() -> Self {
        GameService {}
    }
}

#[async_trait]
impl Service<GameRequest, GameRequestHandler> for GameService {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{rngs::mock::StepRng, RngCore};

    use super::*;
    use crate::models::{
        transactions::{LedgerEntry, Status, TransactionType},
        users::NewUser,
    };
    use crate::services::{mailer::MemoryMailer, testing};

    // First draw is just below 1.0, so the first spin after the opening game loses.
    fn losing_rng() -> StepRng {
        StepRng::new(u64::MAX, 1)
    }

    // Always draws 0.0, so every spin wins.
    fn winning_rng() -> StepRng {
        StepRng::new(0, 0)
    }

    async fn player(
        rng: impl RngCore + Send + 'static,
        balance: f64,
    ) -> (GameRequestHandler, Arc<MemoryMailer>, i32) {
        let mailer = Arc::new(MemoryMailer::new());
        let context = testing::context(mailer.clone(), rng);
        let user = context
            .ledger
            .insert_user(
                NewUser {
                    username: "ada".to_string(),
                    email: "ada@example.com".to_string(),
                    password: "x.y".to_string(),
                    full_name: None,
                    referral_code: "ADA00001".to_string(),
                    referred_by: None,
                    balance,
                },
                LedgerEntry::completed(TransactionType::SignupBonus, balance, "seed"),
            )
            .await
            .unwrap();
        (GameRequestHandler::new(context), mailer, user.id)
    }

    fn bet(selected_number: i32, bet_amount: f64) -> Bet {
        Bet {
            selected_number,
            bet_amount,
        }
    }

    #[tokio::test]
    async fn first_game_wins_even_with_a_losing_rng() {
        let (handler, mailer, user_id) = player(losing_rng(), 2000.0).await;

        let outcome = handler.play(user_id, bet(5, 1000.0)).await.unwrap();
        assert!(outcome.game.is_win);
        assert_eq!(outcome.game.result_number, 5);
        assert_eq!(outcome.game.win_amount, 1800.0);
        assert_eq!(outcome.new_balance, 2800.0);
        assert_eq!(
            mailer.outbox()[0].subject,
            "Congratulations! You won on SpinBet!"
        );
    }

    #[tokio::test]
    async fn later_loss_takes_the_stake() {
        let (handler, mailer, user_id) = player(losing_rng(), 10_000.0).await;
        handler.play(user_id, bet(3, 100.0)).await.unwrap();
        let balance = handler.context.ledger.get_user(user_id).await.unwrap().unwrap().balance;

        let outcome = handler.play(user_id, bet(5, 1000.0)).await.unwrap();
        assert!(!outcome.game.is_win);
        assert_ne!(outcome.game.result_number, 5);
        assert!(game::WHEEL.contains(&outcome.game.result_number));
        assert_eq!(outcome.game.win_amount, 0.0);
        assert_eq!(outcome.new_balance, balance - 1000.0);
        assert_eq!(mailer.outbox().len(), 1);

        let entries = handler
            .context
            .ledger
            .get_user_transactions(user_id)
            .await
            .unwrap();
        let loss = &entries[0];
        assert_eq!(loss.kind, TransactionType::GameLoss);
        assert_eq!(loss.amount, 1000.0);
        assert_eq!(loss.status, Status::Completed);
        assert_eq!(
            loss.details.clone().unwrap(),
            format!("Game #{} - Loss", outcome.game.id)
        );
    }

    #[tokio::test]
    async fn bet_above_balance_is_refused() {
        let (handler, _, user_id) = player(winning_rng(), 500.0).await;

        let err = handler.play(user_id, bet(4, 500.01)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientBalance));
        assert!(handler.history(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn big_wins_are_broadcast() {
        let (handler, _, user_id) = player(winning_rng(), 10_000.0).await;
        let (_, mut viewer) = handler.context.notifier.register();

        handler.play(user_id, bet(2, 1000.0)).await.unwrap();
        assert!(viewer.try_recv().is_err());

        handler.play(user_id, bet(2, 3000.0)).await.unwrap();
        let event: serde_json::Value =
            serde_json::from_str(&viewer.recv().await.unwrap()).unwrap();
        assert_eq!(event["type"], "bigWin");
        assert_eq!(event["data"]["username"], "ada");
        assert_eq!(event["data"]["amount"], 5400.0);
    }

    #[tokio::test]
    async fn leaderboard_ranks_winnings() {
        let (handler, _, user_id) = player(winning_rng(), 10_000.0).await;
        handler.play(user_id, bet(6, 1000.0)).await.unwrap();
        handler.play(user_id, bet(6, 1000.0)).await.unwrap();

        let leaderboard = handler.leaderboard().await.unwrap();
        assert_eq!(leaderboard.len(), 1);
        assert_eq!(leaderboard[0].games_played, 2);
        assert_eq!(leaderboard[0].total_winnings, 3600.0);
        assert_eq!(handler.history(user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn leaderboard_keeps_the_top_ten() {
        let (handler, _, _) = player(winning_rng(), 0.0).await;

        for n in 1..=12 {
            let user = handler
                .context
                .ledger
                .insert_user(
                    NewUser {
                        username: format!("player{}", n),
                        email: format!("player{}@example.com", n),
                        password: "x.y".to_string(),
                        full_name: None,
                        referral_code: format!("PLAYER{:02}", n),
                        referred_by: None,
                        balance: 10_000.0,
                    },
                    LedgerEntry::completed(TransactionType::SignupBonus, 10_000.0, "seed"),
                )
                .await
                .unwrap();
            handler.play(user.id, bet(6, 100.0 * n as f64)).await.unwrap();
        }

        let leaderboard = handler.leaderboard().await.unwrap();
        assert_eq!(leaderboard.len(), LEADERBOARD_SIZE as usize);
        assert_eq!(leaderboard[0].username, "player12");
        assert_eq!(leaderboard[0].total_winnings, 2160.0);
        assert_eq!(leaderboard[9].username, "player3");
        assert!(leaderboard
            .windows(2)
            .all(|pair| pair[0].total_winnings >= pair[1].total_winnings));
    }
}
