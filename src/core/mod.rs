pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{ForeignKey, Parameter, Row, RowData};
pub use value::{SqlType, Value};
