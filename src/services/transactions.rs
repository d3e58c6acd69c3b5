use async_trait::async_trait;

use super::{RequestHandler, Responder, Service, ServiceError};
use crate::{models::transactions::Transaction, repositories::Ledger};

pub enum TransactionServiceRequest {
    List {
        user_id: i32,
        response: Responder<Vec<Transaction>>,
    },
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    ledger: Ledger,
}

impl TransactionRequestHandler {
    pub fn new(ledger: Ledger) -> Self {
        TransactionRequestHandler { ledger }
    }

    async fn list(&self, user_id: i32) -> Result<Vec<Transaction>, ServiceError> {
        self.ledger
            .get_user_transactions(user_id)
            .await
            .map_err(ServiceError::database)
    }
}

#[async_trait]
impl RequestHandler<TransactionServiceRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionServiceRequest) {
        match request {
            TransactionServiceRequest::List { user_id, response } => {
                let transactions = self.list(user_id).await;
                let _ = response.send(transactions);
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionServiceRequest, TransactionRequestHandler> for TransactionService {}
