use serde::Serialize;

/// A scalar value that can be bound to a query placeholder.
///
/// The set is closed: anything that is not null, a boolean, an integer, a float
/// or a string is rejected before it can become a `SqlValue`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

macro_rules! sql_value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::Int(i64::from(value))
                }
            }
        )*
    };
}

sql_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Float(f64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// A value fetched from a result row, in the type the driver reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl RowValue {
    pub fn as_int(&self) -> Option<i64> {
        if let RowValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        if let RowValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let RowValue::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let RowValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValue::Blob(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    /// Text form of the value, for handles configured to stringify fetches.
    /// Nulls stay null.
    pub fn into_text(self) -> RowValue {
        match self {
            RowValue::Null => RowValue::Null,
            RowValue::Bool(b) => RowValue::Text(b.to_string()),
            RowValue::Int(i) => RowValue::Text(i.to_string()),
            RowValue::Float(f) => RowValue::Text(f.to_string()),
            RowValue::Text(s) => RowValue::Text(s),
            RowValue::Blob(b) => RowValue::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::Text(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::Text(value)
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Int(value)
    }
}

impl From<i32> for RowValue {
    fn from(value: i32) -> Self {
        RowValue::Int(i64::from(value))
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        RowValue::Float(value)
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        RowValue::Bool(value)
    }
}

impl From<Vec<u8>> for RowValue {
    fn from(value: Vec<u8>) -> Self {
        RowValue::Blob(value)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => RowValue::Null,
        }
    }
}

/// Identifier generated by the last insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InsertId {
    Int(i64),
    /// Non-numeric identifiers (UUIDs and the like) are kept verbatim.
    Text(String),
}

impl InsertId {
    /// Interprets the identifier string reported by a driver.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => InsertId::Int(id),
            Err(_) => InsertId::Text(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            InsertId::Int(id) => Some(*id),
            InsertId::Text(_) => None,
        }
    }
}
