pub mod me;
pub mod memos;
