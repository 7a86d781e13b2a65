//! Optimistic like, edit and delete for a paginated social feed.
//!
//! A mutation patches every cached view of its item at once (the global feed,
//! the following-only feed and the author's profile feed), then reconciles
//! with the server's answer or rolls back.
//!
//! - [`cache`] - partitions, the cache store and the patcher
//! - [`mutation`] - commands, validation and the dispatcher
//! - [`feed`] - cursor-based page loading into the cache
//! - [`ui`] - per-item controllers and the event loop
//! - [`storage`] - SQLite reference backend
//! - [`config`] - `config.toml` loading

pub mod app;
pub mod cache;
pub mod config;
pub mod feed;
pub mod mutation;
pub mod session;
pub mod storage;
pub mod ui;
pub mod util;
