//! Entity capability
//!
//! The data layer is generic over any record type implementing [`Entity`].
//! Identity is a compile-time capability: an entity exposes its key through
//! [`Entity::key`] instead of having a field looked up by name at runtime.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite};
use std::fmt;
use std::hash::Hash;

/// A single column value as written to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Returns true for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Binds this value to the next placeholder of `query`
    pub(crate) fn bind_to<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Bool(v) => query.bind(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Primary key types usable by the change tracker
pub trait EntityKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Converts the key to a bindable value
    fn to_value(&self) -> Value;

    /// Reads a key back from a store-generated value
    fn from_value(value: Value) -> Option<Self>;
}

impl EntityKey for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }
}

impl EntityKey for i32 {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl EntityKey for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v),
            Value::Integer(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

/// A record type persisted in one table of the store
///
/// The data layer never inspects business fields except through
/// [`Entity::value`] when writing rows; reads decode whole rows with
/// [`FromRow`].
///
/// # Example
///
/// ```rust
/// use infra_db::{Entity, Value};
///
/// #[derive(Debug, Clone, sqlx::FromRow)]
/// struct Note {
///     id: String,
///     body: String,
/// }
///
/// impl Entity for Note {
///     type Key = String;
///     const TABLE: &'static str = "notes";
///     const COLUMNS: &'static [&'static str] = &["body"];
///
///     fn key(&self) -> Option<String> {
///         Some(self.id.clone())
///     }
///
///     fn set_key(&mut self, key: String) {
///         self.id = key;
///     }
///
///     fn value(&self, column: &str) -> Value {
///         match column {
///             "body" => self.body.as_str().into(),
///             _ => Value::Null,
///         }
///     }
/// }
/// ```
pub trait Entity:
    Clone + fmt::Debug + Send + Sync + Unpin + 'static + for<'r> FromRow<'r, SqliteRow>
{
    /// Primary key type
    type Key: EntityKey;

    /// Table holding this entity
    const TABLE: &'static str;

    /// Primary key column
    const KEY_COLUMN: &'static str = "id";

    /// Persisted columns, excluding the key
    const COLUMNS: &'static [&'static str];

    /// The store assigns the key on insert when [`Entity::key`] is `None`
    const GENERATED_KEY: bool = false;

    /// Returns the identity, `None` while a generated key is still unassigned
    fn key(&self) -> Option<Self::Key>;

    /// Stores the key assigned by the store
    fn set_key(&mut self, key: Self::Key);

    /// Returns the value of a persisted column
    fn value(&self, column: &str) -> Value;

    /// Short name used in logs and errors
    fn entity_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Checks that `column` is one of the persisted columns
    fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }
}
