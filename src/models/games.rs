use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i32,
    pub user_id: i32,
    pub bet_amount: f64,
    pub selected_number: i32,
    pub result_number: i32,
    pub is_win: bool,
    pub win_amount: f64,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct NewGame {
    pub user_id: i32,
    pub bet_amount: f64,
    pub selected_number: i32,
    pub result_number: i32,
    pub is_win: bool,
    pub win_amount: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub selected_number: i32,
    pub bet_amount: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOutcome {
    #[serde(flatten)]
    pub game: Game,
    pub new_balance: f64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i32,
    pub username: String,
    pub total_winnings: f64,
    pub games_played: i64,
}
