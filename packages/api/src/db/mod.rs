//! # Database module: PostgreSQL persistence
//!
//! [`connect`] opens the connection pool, [`MIGRATOR`] carries the embedded schema
//! from `migrations/`, and [`PgStore`] implements the store crate's
//! [`DocumentStore`](store::DocumentStore) on top of both.
//!
//! Reference sets (`contacts.labels`, `labels.contacts`, `shared_contacts.contacts`)
//! are `uuid[]` columns, so the set primitives map onto `array_append`,
//! `array_remove` and the `&&` overlap operator.

mod pg;
mod pool;

pub use pg::PgStore;
pub use pool::connect;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
