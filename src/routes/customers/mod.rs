pub mod carts;
pub mod orders;
