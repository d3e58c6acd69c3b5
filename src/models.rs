pub mod deposits;
pub mod games;
pub mod transactions;
pub mod users;
pub mod withdrawals;
