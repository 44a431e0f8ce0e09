//! Positional call arguments.
//!
//! Calls carry an ordered list of JSON values. Callers pass any `Serialize`
//! value and handlers receive any `DeserializeOwned` value; the conversion
//! rules below decide how the two line up:
//!
//! | caller passes          | `userArgs`     |
//! |------------------------|----------------|
//! | `()`                   | `[]`           |
//! | tuple / `Vec` / array  | its elements   |
//! | any other value `v`    | `[v]`          |
//!
//! On the answering side the list is deserialized as a whole first (so
//! tuples line up positionally). If that fails, a single-element list is
//! retried as its only element and an empty list as `null`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RpcError};

/// Ordered call arguments.
///
/// Handlers that want raw access can take `Args` directly:
///
/// ```
/// use chanrpc::Args;
///
/// let args = Args::from_serialize(&(2, "x")).unwrap();
/// assert_eq!(args.len(), 2);
/// assert_eq!(args.get::<i32>(0).unwrap(), 2);
/// assert_eq!(args.get::<String>(1).unwrap(), "x");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    /// Convert a caller-side value into positional arguments.
    pub fn from_serialize<T>(value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        // ---
        let list = match serde_json::to_value(value)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        };
        Ok(Self(list))
    }

    /// Deserialize the arguments into the handler's parameter type.
    pub fn parse<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        // ---
        let whole = serde_json::from_value::<T>(Value::Array(self.0.clone()));

        match (whole, self.0.as_slice()) {
            (Ok(parsed), _) => Ok(parsed),
            (Err(_), [only]) => Ok(serde_json::from_value(only.clone())?),
            (Err(_), []) => Ok(serde_json::from_value(Value::Null)?),
            (Err(err), _) => Err(RpcError::Serialization(err)),
        }
    }

    /// Deserialize the argument at `index`.
    pub fn get<T>(&self, index: usize) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.0.get(index).cloned().ok_or_else(|| {
            let err: serde_json::Error = serde::de::Error::custom(format!(
                "argument {index} requested but only {} supplied",
                self.0.len()
            ));
            RpcError::Serialization(err)
        })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}
