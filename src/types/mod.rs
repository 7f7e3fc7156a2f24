mod bound;
mod row;
mod value;

pub use bound::{resolve_bindings, BindValue, Binding, BoundValues, ParamKey, Placeholder};
pub use row::{RawQueryResult, Row};
pub use value::{InsertId, RowValue, SqlValue};
