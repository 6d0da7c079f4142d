//! Dynamic attribute values

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A dynamic value stored as an entity attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Identifier (entity ids, external references)
    Id(Uuid),
    /// List of values
    List(Vec<Value>),
    /// Map of string keys to values
    Map(ValueMap),
}

/// A map of string keys to dynamic values
///
/// Uses IndexMap to preserve insertion order
pub type ValueMap = IndexMap<String, Value>;

/// Type tag of a [`Value`]
///
/// Attributes are keyed by name *and* type, so the same name may hold
/// different values for different types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeType {
    Bool,
    Int,
    Float,
    String,
    Id,
    List,
    Map,
}

impl AttributeType {
    /// Every attribute type
    pub const ALL: [AttributeType; 7] = [
        AttributeType::Bool,
        AttributeType::Int,
        AttributeType::Float,
        AttributeType::String,
        AttributeType::Id,
        AttributeType::List,
        AttributeType::Map,
    ];

    /// Lower-case name of the type
    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::Bool => "bool",
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::String => "string",
            AttributeType::Id => "id",
            AttributeType::List => "list",
            AttributeType::Map => "map",
        }
    }

    /// Check whether `value` has this type
    pub fn matches(&self, value: &Value) -> bool {
        value.attribute_type() == *self
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// The type tag of this value
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Value::Bool(_) => AttributeType::Bool,
            Value::Int(_) => AttributeType::Int,
            Value::Float(_) => AttributeType::Float,
            Value::String(_) => AttributeType::String,
            Value::Id(_) => AttributeType::Id,
            Value::List(_) => AttributeType::List,
            Value::Map(_) => AttributeType::Map,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an identifier
    pub fn as_id(&self) -> Option<Uuid> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get this value as a map
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        self.attribute_type().name()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Id(id) => write!(f, "{}", id),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Id(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::Int(42).as_float(), Some(42.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Int(1).as_bool(), None);
    }

    #[test]
    fn test_attribute_type_tags() {
        let id = Uuid::new_v4();
        assert_eq!(Value::from(id).attribute_type(), AttributeType::Id);
        assert_eq!(Value::from(vec![1i64, 2]).attribute_type(), AttributeType::List);
        assert!(AttributeType::Float.matches(&Value::Float(1.0)));
        assert!(!AttributeType::Float.matches(&Value::Int(1)));
        assert_eq!(AttributeType::Map.to_string(), "map");
    }

    #[test]
    fn test_display() {
        let mut map = ValueMap::new();
        map.insert("rooms".to_string(), Value::Int(3));
        map.insert("tags".to_string(), vec!["old", "creaky"].into());
        assert_eq!(
            Value::Map(map).to_string(),
            "{rooms: 3, tags: [\"old\", \"creaky\"]}"
        );
    }

    #[test]
    fn test_parse_from_ron() {
        let value: Value = ron::from_str("Map({\"haunted\": Bool(true), \"ghosts\": Int(2)})")
            .unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("haunted"), Some(&Value::Bool(true)));
        assert_eq!(map.get("ghosts").and_then(Value::as_int), Some(2));
    }
}
