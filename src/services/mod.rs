pub mod converter;
pub mod storage;
pub mod tools;
pub mod upload;
pub mod worker;
