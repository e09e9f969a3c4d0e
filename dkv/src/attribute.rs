//! Attribute descriptors. Attributes define and compose a schema: each one
//! binds a name to a data type, an optional default, a required flag and a
//! merge strategy, and owns the validation/coercion of values written
//! through it.

use std::sync::Arc;

use crate::error::{DResult, Error};
use crate::key::Key;
use crate::merge::{LatestObjectStrategy, MergeStrategy};
use crate::serial::Value;
use crate::time::NanoTime;

/// The data type of an attribute, with its validation/coercion pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrType {
    /// UTF-8 text. Rejects embedded newlines unless `multiline`.
    String { multiline: bool },
    /// A string that must normalize as a [`Key`]. Stored normalized.
    Key,
    /// 64-bit signed integer. Rejects booleans and out-of-range values.
    Integer,
    Float,
    Boolean,
    /// Nanosecond timestamp.
    Time,
    /// Wall-clock datetime, stored as nanoseconds, presented as RFC 3339.
    DateTime,
    /// Homogeneous list; elements coerce to the declared element type.
    List(Box<AttrType>),
    /// String-keyed mapping; values coerce to the declared element type.
    Dict(Box<AttrType>),
}

impl AttrType {
    /// Validates `value` against this type, coercing where the type allows
    /// it. Null passes through every type; emptiness is the descriptor's
    /// concern, not the type's.
    pub fn validate(&self, name: &str, value: Value) -> DResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            AttrType::String { multiline } => {
                let s = coerce_string(name, value)?;
                if !multiline && s.contains('\n') {
                    return Err(Error::Value(format!("attribute {} is not multi-line", name)));
                }
                Ok(Value::Str(s))
            }
            AttrType::Key => {
                let s = coerce_string(name, value)?;
                if s.contains('\n') {
                    return Err(Error::Value(format!("attribute {} is not multi-line", name)));
                }
                Ok(Value::Str(Key::new(s).as_str().to_string()))
            }
            AttrType::Integer => match value {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Bool(_) => Err(Error::Value(format!(
                    "attribute {} must be an integer, not a bool",
                    name
                ))),
                Value::Float(x) => {
                    if x.is_finite() && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
                        Ok(Value::Int(x as i64))
                    } else {
                        Err(Error::Value(format!("attribute {} must fit in 64 bits", name)))
                    }
                }
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    Error::Value(format!("value {:?} for attribute {} is not an integer", s, name))
                }),
                other => Err(type_error(name, "an integer", &other)),
            },
            AttrType::Float => match value {
                Value::Float(x) => Ok(Value::Float(x)),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    Error::Value(format!("value {:?} for attribute {} is not a float", s, name))
                }),
                other => Err(type_error(name, "a float", &other)),
            },
            AttrType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::Int(0) => Ok(Value::Bool(false)),
                Value::Int(1) => Ok(Value::Bool(true)),
                Value::Int(i) => Err(Error::Value(format!(
                    "value {} for attribute {} is not a boolean",
                    i, name
                ))),
                other => Err(type_error(name, "a boolean", &other)),
            },
            AttrType::Time => match value {
                Value::Int(ns) => Ok(Value::Int(ns)),
                Value::Float(x) => Ok(Value::Int(x as i64)),
                other => Err(type_error(name, "a nanosecond time", &other)),
            },
            AttrType::DateTime => match value {
                Value::Int(ns) => Ok(Value::Int(ns)),
                Value::Str(s) => {
                    Ok(Value::Int(NanoTime::parse_rfc3339(&s)?.nanoseconds()))
                }
                other => Err(type_error(name, "a datetime", &other)),
            },
            AttrType::List(elem) => match value {
                Value::List(items) => {
                    let coerced: DResult<Vec<Value>> =
                        items.into_iter().map(|item| elem.validate(name, item)).collect();
                    Ok(Value::List(coerced?))
                }
                other => Err(type_error(name, "a list", &other)),
            },
            AttrType::Dict(elem) => match value {
                Value::Map(m) => {
                    let mut coerced = std::collections::BTreeMap::new();
                    for (k, v) in m {
                        coerced.insert(k, elem.validate(name, v)?);
                    }
                    Ok(Value::Map(coerced))
                }
                other => Err(type_error(name, "a mapping", &other)),
            },
        }
    }

    /// The emptiness predicate, stricter than truthiness where needed:
    /// 0, false, `[]` and `{}` are all not empty.
    pub fn is_empty(&self, value: &Value) -> bool {
        match self {
            AttrType::String { .. } | AttrType::Key => {
                matches!(value, Value::Null) || matches!(value, Value::Str(s) if s.is_empty())
            }
            _ => value.is_null(),
        }
    }

    /// Presentation of a stored value to callers. Identity for every type
    /// except DateTime, which renders its nanoseconds as RFC 3339.
    pub fn present(&self, value: Value) -> Value {
        if let (AttrType::DateTime, Value::Int(ns)) = (self, &value) {
            return Value::Str(NanoTime::from_nanoseconds(*ns).rfc3339());
        }
        value
    }
}

fn coerce_string(name: &str, value: Value) -> DResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(x) => Ok(x.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(type_error(name, "a string", &other)),
    }
}

fn type_error(name: &str, expected: &str, got: &Value) -> Error {
    Error::Type(format!("value for attribute {} is not {}, got {}", name, expected, got.type_name()))
}

/// A schema element binding a name, a data type, a default, a required flag
/// and a merge strategy to a model field.
#[derive(Clone)]
pub struct Attribute {
    name: String,
    attr_type: AttrType,
    default: Option<Value>,
    required: bool,
    strategy: Arc<dyn MergeStrategy>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Attribute {
        Attribute {
            name: name.into(),
            attr_type,
            default: None,
            required: false,
            strategy: Arc::new(LatestObjectStrategy),
        }
    }

    pub fn string(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::String { multiline: false })
    }

    pub fn key(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::Key)
    }

    pub fn integer(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::Boolean)
    }

    pub fn time(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::Time)
    }

    pub fn datetime(name: impl Into<String>) -> Attribute {
        Attribute::new(name, AttrType::DateTime)
    }

    pub fn list(name: impl Into<String>, elem: AttrType) -> Attribute {
        Attribute::new(name, AttrType::List(Box::new(elem)))
    }

    pub fn dict(name: impl Into<String>, elem: AttrType) -> Attribute {
        Attribute::new(name, AttrType::Dict(Box::new(elem)))
    }

    /// Allows embedded newlines. Meaningful for string attributes only.
    pub fn multiline(mut self) -> Attribute {
        if let AttrType::String { ref mut multiline } = self.attr_type {
            *multiline = true;
        }
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Attribute {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Attribute {
        self.required = true;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn MergeStrategy>) -> Attribute {
        self.strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> &AttrType {
        &self.attr_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn merge_strategy(&self) -> &Arc<dyn MergeStrategy> {
        &self.strategy
    }

    /// Asserts that `value` is compatible with this attribute, coercing to
    /// the declared data type. Empty values fail when the attribute is
    /// required.
    pub fn validate(&self, value: Value) -> DResult<Value> {
        if self.required && self.attr_type.is_empty(&value) {
            return Err(Error::Value(format!("attribute {} is required", self.name)));
        }
        self.attr_type.validate(&self.name, value)
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.attr_type)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::Error;

    fn str_value(s: &str) -> Value {
        Value::Str(s.to_string())
    }

    #[test]
    fn string_coercion() {
        let a = Attribute::string("a");
        assert_eq!(a.validate(Value::Int(5)).unwrap(), str_value("5"));
        assert_eq!(a.validate(Value::Float(5.2)).unwrap(), str_value("5.2"));
        assert_eq!(a.validate(Value::Bool(true)).unwrap(), str_value("true"));
        assert_eq!(a.validate(str_value("5")).unwrap(), str_value("5"));
        assert!(matches!(a.validate(str_value("5\n\nmore")), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::List(vec![])), Err(Error::Type(_))));

        let a = Attribute::string("a").multiline();
        assert_eq!(a.validate(str_value("5\n\nmore")).unwrap(), str_value("5\n\nmore"));
    }

    #[test]
    fn key_coercion() {
        let a = Attribute::key("a");
        assert_eq!(a.validate(str_value("5")).unwrap(), str_value("/5"));
        assert_eq!(a.validate(str_value("/a//b/")).unwrap(), str_value("/a/b"));
        assert_eq!(a.validate(Value::Int(5)).unwrap(), str_value("/5"));
        assert!(matches!(a.validate(str_value("5\n\nmore")), Err(Error::Value(_))));
    }

    #[test]
    fn integer_coercion() {
        let a = Attribute::integer("a");
        assert_eq!(a.validate(Value::Int(5)).unwrap(), Value::Int(5));
        assert_eq!(a.validate(Value::Float(5.2)).unwrap(), Value::Int(5));
        assert_eq!(a.validate(str_value("5")).unwrap(), Value::Int(5));
        assert!(matches!(a.validate(str_value("5a")), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::Bool(true)), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::Float(1e300)), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::List(vec![])), Err(Error::Type(_))));
    }

    #[test]
    fn float_coercion() {
        let a = Attribute::float("a");
        assert_eq!(a.validate(Value::Float(5.2)).unwrap(), Value::Float(5.2));
        assert_eq!(a.validate(Value::Int(5)).unwrap(), Value::Float(5.0));
        assert_eq!(a.validate(str_value("5.5")).unwrap(), Value::Float(5.5));
        assert!(matches!(a.validate(str_value("x")), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::Bool(true)), Err(Error::Type(_))));
    }

    #[test]
    fn boolean_coercion() {
        let a = Attribute::boolean("a");
        assert_eq!(a.validate(Value::Bool(true)).unwrap(), Value::Bool(true));
        assert_eq!(a.validate(Value::Int(0)).unwrap(), Value::Bool(false));
        assert_eq!(a.validate(Value::Int(1)).unwrap(), Value::Bool(true));
        assert!(matches!(a.validate(Value::Int(2)), Err(Error::Value(_))));
        assert!(matches!(a.validate(str_value("yes")), Err(Error::Type(_))));
    }

    #[test]
    fn time_coercion() {
        let a = Attribute::time("a");
        assert_eq!(a.validate(Value::Int(5)).unwrap(), Value::Int(5));
        assert_eq!(a.validate(Value::Float(5.2)).unwrap(), Value::Int(5));
        assert!(matches!(a.validate(str_value("5")), Err(Error::Type(_))));
        assert!(matches!(a.validate(str_value("5a")), Err(Error::Type(_))));
    }

    #[test]
    fn datetime_coercion() {
        let a = Attribute::datetime("a");
        assert_eq!(
            a.validate(str_value("1970-01-01T00:00:01Z")).unwrap(),
            Value::Int(1_000_000_000)
        );
        assert_eq!(a.validate(Value::Int(7)).unwrap(), Value::Int(7));
        assert!(matches!(a.validate(str_value("not a date")), Err(Error::Value(_))));
        assert!(matches!(a.validate(Value::Bool(true)), Err(Error::Type(_))));

        // stored nanoseconds present as RFC 3339
        assert_eq!(
            a.attr_type().present(Value::Int(1_000_000_000)),
            str_value("1970-01-01T00:00:01.000000000Z")
        );
    }

    #[test]
    fn list_coercion() {
        let a = Attribute::list("a", AttrType::Integer);
        assert_eq!(
            a.validate(Value::List(vec![Value::Int(1), str_value("2"), Value::Float(3.5)]))
                .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(matches!(
            a.validate(Value::List(vec![str_value("x")])),
            Err(Error::Value(_))
        ));
        assert!(matches!(a.validate(str_value("abc")), Err(Error::Type(_))));
    }

    #[test]
    fn dict_coercion() {
        let a = Attribute::dict("a", AttrType::String { multiline: false });
        let mut m = std::collections::BTreeMap::new();
        m.insert("x".to_string(), Value::Int(5));
        let mut expected = std::collections::BTreeMap::new();
        expected.insert("x".to_string(), str_value("5"));
        assert_eq!(a.validate(Value::Map(m)).unwrap(), Value::Map(expected));
        assert!(matches!(a.validate(Value::Int(5)), Err(Error::Type(_))));
    }

    #[test]
    fn emptiness() {
        assert!(Attribute::string("a").attr_type().is_empty(&Value::Null));
        assert!(Attribute::string("a").attr_type().is_empty(&str_value("")));
        assert!(!Attribute::string("a").attr_type().is_empty(&str_value("x")));
        // 0, false, [] and {} are all not empty
        assert!(!Attribute::integer("a").attr_type().is_empty(&Value::Int(0)));
        assert!(!Attribute::float("a").attr_type().is_empty(&Value::Float(0.0)));
        assert!(!Attribute::boolean("a").attr_type().is_empty(&Value::Bool(false)));
        assert!(!Attribute::list("a", AttrType::Integer)
            .attr_type()
            .is_empty(&Value::List(vec![])));
        assert!(!Attribute::dict("a", AttrType::Integer)
            .attr_type()
            .is_empty(&Value::Map(Default::default())));
    }

    #[test]
    fn required_rejects_empty() {
        let a = Attribute::string("a").required();
        assert!(matches!(a.validate(Value::Null), Err(Error::Value(_))));
        assert!(matches!(a.validate(str_value("")), Err(Error::Value(_))));
        assert_eq!(a.validate(str_value("x")).unwrap(), str_value("x"));

        // zero is a fine value for a required integer
        let a = Attribute::integer("a").required();
        assert_eq!(a.validate(Value::Int(0)).unwrap(), Value::Int(0));
    }

    #[test]
    fn defaults_and_strategy() {
        let a = Attribute::string("a").default_value("Firstname");
        assert_eq!(a.default(), Some(&str_value("Firstname")));
        assert!(!a.is_required());
        assert_eq!(a.merge_strategy().name(), "latest-object");
    }
}
