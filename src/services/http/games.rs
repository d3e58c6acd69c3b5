use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{dispatch, ApiJson, AppState, CurrentUser};
use crate::{
    game::WHEEL,
    models::games::Bet,
    services::{games::GameRequest, ServiceError},
};

fn validate_bet(bet: &Bet) -> Result<(), ServiceError> {
    if !WHEEL.contains(&bet.selected_number) {
        return Err(ServiceError::Validation(format!(
            "Selected number must be between {} and {}",
            WHEEL.start(),
            WHEEL.end()
        )));
    }
    if !(bet.bet_amount.is_finite() && bet.bet_amount > 0.0) {
        return Err(ServiceError::Validation(
            "Bet amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub async fn play(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(bet): ApiJson<Bet>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_bet(&bet)?;

    let outcome = dispatch(&state.game_channel, |response| GameRequest::Play {
        user_id: caller.user_id,
        bet,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn history(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let games = dispatch(&state.game_channel, |response| GameRequest::History {
        user_id: caller.user_id,
        response,
    })
    .await?;

    Ok(Json(games))
}

pub async fn leaderboard(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let entries = dispatch(&state.game_channel, |response| GameRequest::Leaderboard {
        response,
    })
    .await?;

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bets_must_target_the_wheel_with_a_positive_stake() {
        let bet = |selected_number, bet_amount| Bet {
            selected_number,
            bet_amount,
        };

        assert!(validate_bet(&bet(2, 1.0)).is_ok());
        assert!(validate_bet(&bet(8, 500.0)).is_ok());
        assert!(validate_bet(&bet(1, 100.0)).is_err());
        assert!(validate_bet(&bet(9, 100.0)).is_err());
        assert!(validate_bet(&bet(5, 0.0)).is_err());
        assert!(validate_bet(&bet(5, -10.0)).is_err());
        assert!(validate_bet(&bet(5, f64::NAN)).is_err());
    }
}
