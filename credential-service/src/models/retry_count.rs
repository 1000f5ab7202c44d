//! Per-username retry counter.
//!
//! A weak reference by username only: no FK to the account row, looked up
//! and deleted independently during purge.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RetryCount {
    pub username: String,
    pub count: i32,
}

impl RetryCount {
    pub fn new(username: String) -> Self {
        Self { username, count: 0 }
    }
}
