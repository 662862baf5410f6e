pub mod audit;
pub mod block_page;
pub mod config;
pub mod control;
pub mod db;
pub mod engine;
pub mod error;
pub mod flow;
pub mod init;
pub mod notifier;
pub mod stats;
