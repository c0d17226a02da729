pub mod bithumb;
pub mod upbit;

// Re-export the clients for convenient access (e.g. `use crate::exchange::UpbitClient`).
pub use bithumb::BithumbClient;
pub use upbit::UpbitClient;
