pub mod customers;
pub mod shared;
pub mod staff;
