pub mod archival;
pub mod checkout;
pub mod order_service;
