//! Outcome and payout rules for the number spin.
//!
//! A player picks a number on the wheel and stakes an amount. The first game a
//! player ever plays lands on their number; every later spin wins with a fixed
//! probability and otherwise lands uniformly on one of the remaining numbers.

use std::ops::RangeInclusive;

use rand::Rng;

pub const WHEEL: RangeInclusive<i32> = 2..=8;
pub const WIN_PROBABILITY: f64 = 0.30;
pub const PAYOUT_MULTIPLIER: f64 = 1.8;
pub const BIG_WIN_THRESHOLD: f64 = 5000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spin {
    pub result_number: i32,
    pub is_win: bool,
    pub win_amount: f64,
}

impl Spin {
    pub fn is_big_win(&self) -> bool {
        self.is_win && self.win_amount >= BIG_WIN_THRESHOLD
    }
}

pub fn spin<R: Rng + ?Sized>(
    selected_number: i32,
    bet_amount: f64,
    first_game: bool,
    rng: &mut R,
) -> Spin {
    let result_number = if first_game || rng.gen::<f64>() < WIN_PROBABILITY {
        selected_number
    } else {
        let others: Vec<i32> = WHEEL.filter(|n| *n != selected_number).collect();
        others[rng.gen_range(0..others.len())]
    };

    let is_win = result_number == selected_number;
    let win_amount = if is_win {
        bet_amount * PAYOUT_MULTIPLIER
    } else {
        0.0
    };

    Spin {
        result_number,
        is_win,
        win_amount,
    }
}

/// Balance after the stake is taken and any payout credited.
pub fn settle(balance: f64, bet_amount: f64, spin: &Spin) -> f64 {
    balance - bet_amount + spin.win_amount
}
