//! Pool options application.

use crate::ConnectOpts;
use sea_orm::sqlx::sqlite::SqlitePoolOptions;

/// Applies [`ConnectOpts`] pool knobs to a pool builder.
pub trait ApplyPoolOpts {
    fn apply(self, opts: &ConnectOpts) -> Self;
}

impl ApplyPoolOpts for SqlitePoolOptions {
    fn apply(mut self, opts: &ConnectOpts) -> Self {
        if let Some(n) = opts.max_conns {
            self = self.max_connections(n);
        }
        if let Some(t) = opts.acquire_timeout {
            self = self.acquire_timeout(t);
        }
        if let Some(t) = opts.idle_timeout {
            self = self.idle_timeout(t);
        }
        self
    }
}
