//! Postgres protocol-level definitions.
mod pg_format;
mod pg_type;

pub use pg_format::PgFormat;
pub use pg_type::{Oid, PgType};
