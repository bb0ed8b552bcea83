pub mod core;
pub mod deals;
pub mod records;
pub mod tasks;
