pub mod archive_client;
pub mod identity;
#[cfg(test)]
pub mod memory_repo;
pub mod models;
pub mod order_repo;
pub mod retry;
