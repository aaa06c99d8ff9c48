pub mod storage;
pub mod tools;
