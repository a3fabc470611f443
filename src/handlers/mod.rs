pub mod checkout;
pub mod health;
pub mod receipts;
pub mod redirect;
pub mod sessions;
pub mod wallet;
pub mod webhooks;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
