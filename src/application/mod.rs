pub mod block_store;
pub mod bootstrap;
pub mod context;
pub mod reminder;
