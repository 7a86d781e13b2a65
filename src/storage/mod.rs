mod feeds;
mod schema;
mod seed;
mod service;
mod tweets;
mod types;
mod users;

pub use schema::Database;
pub use types::{DatabaseError, SeedSummary, TweetError};
