//! Postgres value codecs and type mapping.
//!
//! # Examples
//!
//! Decoding a buffered result:
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use pgcodec::{ByteStr, ColumnDesc, PgFormat, ResultBuffer, Value};
//! use pgcodec::typemap::ByColumn;
//! use pgcodec::codec::Int4;
//!
//! # fn app() -> pgcodec::Result<()> {
//! let columns = vec![
//!     ColumnDesc::new(ByteStr::from_static("id"), 23, PgFormat::Text),
//!     ColumnDesc::new(ByteStr::from_static("name"), 25, PgFormat::Text),
//! ];
//! let rows = vec![vec![
//!     Some(Bytes::from_static(b"42")),
//!     Some(Bytes::from_static(b"ada")),
//! ]];
//! let map = ByColumn::new(vec![Some(Arc::new(Int4::text()) as _), None]);
//!
//! let result = ResultBuffer::new(columns, rows, Arc::new(map))?;
//! assert_eq!(result.get(0, 0)?, Value::Int(42));
//! assert_eq!(result.get_by_name(0, "name")?, Value::Text("ada".into()));
//! # Ok(())
//! # }
//! # app().unwrap();
//! ```
//!
//! Encoding query parameters, dispatching on value kind:
//!
//! ```
//! use std::sync::Arc;
//! use pgcodec::{PgFormat, Value, ValueKind};
//! use pgcodec::codec::{Int4, PgString};
//! use pgcodec::encode::encode_params;
//! use pgcodec::typemap::ByValueKind;
//!
//! # fn app() -> pgcodec::Result<()> {
//! let map = ByValueKind::new()
//!     .set(ValueKind::Int, Arc::new(Int4::binary()))
//!     .set(ValueKind::Text, Arc::new(PgString::text()));
//!
//! let params = encode_params(&map, &[Value::Int(42), "O'Reilly".into()])?;
//! assert_eq!(params.formats(), [PgFormat::Binary, PgFormat::Text]);
//! assert_eq!(params.values()[1].as_deref(), Some(&b"O'Reilly"[..]));
//! # Ok(())
//! # }
//! # app().unwrap();
//! ```

pub mod common;
mod ext;

// Protocol
pub mod postgres;

// Encoding
mod value;
pub mod codec;
pub mod encode;
pub mod typemap;

// Result
pub mod result;
pub mod tuple;

mod error;


pub use common::ByteStr;
pub use postgres::{Oid, PgFormat, PgType};

pub use value::{PgDate, PgTimestamp, Value, ValueKind};
pub use codec::{Codec, Encoded, Flags, encode_value};
pub use encode::{QueryParams, encode_copy_row, encode_params};
pub use typemap::{TypeMap, resolve_codec};

pub use result::{ColumnDesc, Fields, ResultBuffer, RowMaps};
pub use tuple::Tuple;

pub use error::{Error, Result};
