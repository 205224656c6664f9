mod errors;
mod transaction_service;

pub use errors::ServiceError;
pub use transaction_service::TransactionService;
