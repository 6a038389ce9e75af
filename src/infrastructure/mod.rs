pub mod block_repository;
pub mod config;
pub mod error;
pub mod notification;
pub mod storage;
