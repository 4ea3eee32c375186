//! Model và tiện ích dùng chung cho swapscan

pub mod models;
pub mod utils;
