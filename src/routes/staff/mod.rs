pub mod inbox;
pub mod orders;
pub mod transactions;
