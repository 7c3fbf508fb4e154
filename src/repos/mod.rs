pub mod error;
pub mod memo;
