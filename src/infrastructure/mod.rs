pub mod separator;
pub mod storage;
