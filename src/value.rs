//! Value types and conversions.

pub use turso::Value;

use crate::error::Error;
use crate::error::Result;

/// Trait for converting Rust types into database values, used for query
/// arguments.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Trait for converting database values back into Rust types.
pub trait FromValue: Sized {
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to this type, or
    /// if the value is null and this type is not nullable.
    fn from_value(value: Value) -> Result<Self>;
}

/// Trait for decoding a full result row into a typed value.
pub trait FromRow: Sized {
    fn from_row(row: &turso::Row) -> Result<Self>;
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

impl IntoValue for i16 {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Real(self as f64)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoValue for &[u8] {
    fn into_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(if self { 1 } else { 0 })
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            Value::Real(v) => Ok(v as i64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Integer", actual: format!("{:?}", other) }),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        i64::from_value(value).map(|v| v as i32)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Real", actual: format!("{:?}", other) }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Text", actual: format!("{:?}", other) }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(Error::TypeConversion { expected: "Blob", actual: format!("{:?}", other) }),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        i64::from_value(value).map(|v| v != 0)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

#[cfg(feature = "with-uuid")]
mod uuid_support {
    use uuid::Uuid;

    use super::*;
    use crate::dialect::PhysicalType;

    impl IntoValue for Uuid {
        /// Defaults to the binary representation; use [`encode_uuid`] when
        /// the target dialect resolves to a different physical type.
        fn into_value(self) -> Value {
            Value::Blob(self.as_bytes().to_vec())
        }
    }

    impl FromValue for Uuid {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Blob(bytes) => Uuid::from_slice(&bytes)
                    .map_err(|_| Error::TypeConversion { expected: "Uuid", actual: format!("Blob({} bytes)", bytes.len()) }),
                Value::Text(text) => Uuid::parse_str(&text)
                    .map_err(|_| Error::TypeConversion { expected: "Uuid", actual: format!("Text({})", text) }),
                Value::Null => Err(Error::UnexpectedNull),
                other => Err(Error::TypeConversion { expected: "Uuid", actual: format!("{:?}", other) }),
            }
        }
    }

    /// Encodes a uuid according to the physical type the dialect capability
    /// table resolved for it.
    pub fn encode_uuid(uuid: Uuid, physical: PhysicalType) -> Result<Value> {
        match physical {
            PhysicalType::BINARY_16 => Ok(Value::Blob(uuid.as_bytes().to_vec())),
            PhysicalType::NATIVE_UUID => Ok(Value::Text(uuid.to_string())),
            other => Err(Error::TypeConversion { expected: "uuid physical type", actual: other.to_string() }),
        }
    }
}

#[cfg(feature = "with-uuid")]
pub use uuid_support::encode_uuid;
