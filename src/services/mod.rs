// Core booking flow
pub mod bookings;
pub mod checkout;
pub mod verification;
pub mod webhook;

// Customer-facing documents and passes
pub mod receipts;
pub mod wallet;
