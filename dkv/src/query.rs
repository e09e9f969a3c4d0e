//! Declarative queries over stored versions: filters, orders, and the
//! serializable [`Query`] that combines them with an offset/limit window.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{DResult, Error};
use crate::key::Key;
use crate::model::{self, Schema};
use crate::serial::{canonical, Value};
use crate::version::Version;

/// A filter comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Op {
    fn passes(self, actual: &Value, operand: &Value) -> bool {
        match self {
            Op::Eq => actual == operand,
            Op::Ne => actual != operand,
            Op::Lt => actual.partial_cmp(operand) == Some(std::cmp::Ordering::Less),
            Op::Gt => actual.partial_cmp(operand) == Some(std::cmp::Ordering::Greater),
            Op::Lte => matches!(
                actual.partial_cmp(operand),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            Op::Gte => matches!(
                actual.partial_cmp(operand),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
        }
    }
}

impl std::str::FromStr for Op {
    type Err = Error;

    fn from_str(s: &str) -> DResult<Op> {
        match s {
            "=" => Ok(Op::Eq),
            "!=" => Ok(Op::Ne),
            "<" => Ok(Op::Lt),
            "<=" => Ok(Op::Lte),
            ">" => Ok(Op::Gt),
            ">=" => Ok(Op::Gte),
            other => Err(Error::Value(format!("unknown filter operator {:?}", other))),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Gt => ">",
            Op::Gte => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Resolves a filter/order field against a version: the version's own
/// fields by name, else a user attribute value.
fn object_value(version: &Version, field: &str) -> Option<Value> {
    match field {
        "key" => Some(Value::from(version.key())),
        "committed" => Some(Value::Int(version.committed().nanoseconds())),
        "created" => Some(Value::Int(version.created().nanoseconds())),
        "hash" => Some(Value::Str(version.hash().to_string())),
        "parent" => Some(Value::Str(version.parent().to_string())),
        "type" => Some(Value::Str(version.type_name().to_string())),
        _ => version.attribute_value(field).cloned(),
    }
}

/// A single `(field, op, operand)` predicate over versions.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    field: String,
    op: Op,
    operand: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: Op, operand: impl Into<Value>) -> Filter {
        Filter { field: field.into(), op, operand: operand.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Whether a raw value passes this filter's comparison.
    pub fn value_passes(&self, value: &Value) -> bool {
        self.op.passes(value, &self.operand)
    }

    /// Whether a version passes. Versions missing the field never pass.
    pub fn passes(&self, version: &Version) -> bool {
        match object_value(version, &self.field) {
            Some(value) => self.value_passes(&value),
            None => false,
        }
    }

    /// The lazy sequence of versions passing every filter.
    pub fn filter<'a, I>(filters: &'a [Filter], versions: I) -> impl Iterator<Item = Version> + 'a
    where
        I: IntoIterator<Item = Version>,
        I::IntoIter: 'a,
    {
        versions.into_iter().filter(move |v| filters.iter().all(|f| f.passes(v)))
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.operand)
    }
}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.op.hash(state);
        canonical::encode(&self.operand).hash(state);
    }
}

/// A sort key: a field name with a `+`/`-` direction prefix. The normalized
/// form always carries the sign; a bare field means ascending.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Order {
    order: String,
}

impl Order {
    pub fn new(order: impl AsRef<str>) -> Order {
        let order = order.as_ref();
        let normalized = if order.starts_with('+') || order.starts_with('-') {
            order.to_string()
        } else {
            format!("+{}", order)
        };
        Order { order: normalized }
    }

    pub fn is_ascending(&self) -> bool {
        !self.order.starts_with('-')
    }

    pub fn field(&self) -> &str {
        &self.order[1..]
    }

    /// The value this order sorts a version by.
    pub fn key_value(&self, version: &Version) -> Option<Value> {
        object_value(version, self.field())
    }

    fn compare(&self, a: &Version, b: &Version) -> std::cmp::Ordering {
        let ordering = match (self.key_value(a), self.key_value(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if self.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        }
    }

    /// Stable multi-key sort: primary by `orders[0]`, ties broken by the
    /// next order, and so on. Equal inputs keep their input order.
    pub fn sorted(versions: Vec<Version>, orders: &[Order]) -> Vec<Version> {
        let mut versions = versions;
        versions.sort_by(|a, b| {
            orders
                .iter()
                .map(|order| order.compare(a, b))
                .find(|ordering| *ordering != std::cmp::Ordering::Equal)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        versions
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.order)
    }
}

/// A declarative query: the parent key naming the queried type, plus
/// filters, orders and an offset/limit window. Serializes to a plain
/// mapping and back; equality and hashing are structural over the
/// normalized form.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    key: Key,
    limit: Option<u64>,
    offset: u64,
    filters: Vec<Filter>,
    orders: Vec<Order>,
}

impl Query {
    pub fn new(key: impl Into<Key>) -> Query {
        Query { key: key.into(), limit: None, offset: 0, filters: Vec::new(), orders: Vec::new() }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The registered schema this query addresses, named by the key's last
    /// segment.
    pub fn model(&self) -> DResult<Arc<Schema>> {
        model::lookup(self.key.name())
    }

    pub fn limit(mut self, limit: u64) -> Query {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Query {
        self.offset = offset;
        self
    }

    pub fn filter(mut self, field: impl Into<String>, op: Op, operand: impl Into<Value>) -> Query {
        self.filters.push(Filter::new(field, op, operand));
        self
    }

    pub fn order(mut self, order: impl AsRef<str>) -> Query {
        self.orders.push(Order::new(order));
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// The plain-mapping form of this query. Zero offsets, absent limits and
    /// empty filter/order lists are omitted.
    pub fn dict(&self) -> Value {
        let mut m = BTreeMap::new();
        m.insert("key".to_string(), Value::from(&self.key));
        if let Some(limit) = self.limit {
            m.insert("limit".to_string(), Value::Int(limit as i64));
        }
        if self.offset > 0 {
            m.insert("offset".to_string(), Value::Int(self.offset as i64));
        }
        if !self.filters.is_empty() {
            m.insert(
                "filter".to_string(),
                Value::List(
                    self.filters
                        .iter()
                        .map(|f| {
                            Value::List(vec![
                                Value::Str(f.field.clone()),
                                Value::Str(f.op.to_string()),
                                f.operand.clone(),
                            ])
                        })
                        .collect(),
                ),
            );
        }
        if !self.orders.is_empty() {
            m.insert(
                "order".to_string(),
                Value::List(self.orders.iter().map(|o| Value::Str(o.order.clone())).collect()),
            );
        }
        Value::Map(m)
    }

    /// Reconstructs a query from its plain-mapping form.
    pub fn from_dict(value: &Value) -> DResult<Query> {
        let m = value
            .as_map()
            .ok_or_else(|| Error::Value("query must be a mapping".to_string()))?;

        let key = match m.get("key") {
            Some(Value::Str(s)) => Key::new(s),
            Some(other) => {
                return Err(Error::Value(format!(
                    "query key must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(Error::Value("query is missing its key".to_string())),
        };
        let mut query = Query::new(key);

        match m.get("limit") {
            Some(Value::Int(limit)) if *limit >= 0 => query.limit = Some(*limit as u64),
            Some(other) => {
                return Err(Error::Value(format!("invalid query limit {}", other)))
            }
            None => {}
        }
        match m.get("offset") {
            Some(Value::Int(offset)) if *offset >= 0 => query.offset = *offset as u64,
            Some(other) => {
                return Err(Error::Value(format!("invalid query offset {}", other)))
            }
            None => {}
        }

        if let Some(filters) = m.get("filter") {
            let filters = match filters {
                Value::List(filters) => filters,
                other => {
                    return Err(Error::Value(format!(
                        "query filter must be a list, got {}",
                        other.type_name()
                    )))
                }
            };
            for entry in filters {
                let triple = match entry {
                    Value::List(triple) if triple.len() == 3 => triple,
                    other => {
                        return Err(Error::Value(format!("invalid query filter entry {}", other)))
                    }
                };
                let field = triple[0]
                    .as_str()
                    .ok_or_else(|| Error::Value("filter field must be a string".to_string()))?;
                let op: Op = triple[1]
                    .as_str()
                    .ok_or_else(|| Error::Value("filter op must be a string".to_string()))?
                    .parse()?;
                query.filters.push(Filter::new(field, op, triple[2].clone()));
            }
        }

        if let Some(orders) = m.get("order") {
            let orders = match orders {
                Value::List(orders) => orders,
                other => {
                    return Err(Error::Value(format!(
                        "query order must be a list, got {}",
                        other.type_name()
                    )))
                }
            };
            for entry in orders {
                let order = entry
                    .as_str()
                    .ok_or_else(|| Error::Value("order entry must be a string".to_string()))?;
                query.orders.push(Order::new(order));
            }
        }

        Ok(query)
    }

    /// Evaluates the query against a candidate set: filters (AND), then
    /// orders, then the offset/limit window.
    pub fn operate(&self, versions: Vec<Version>) -> Vec<Version> {
        let filtered: Vec<Version> = Filter::filter(&self.filters, versions).collect();
        let sorted = Order::sorted(filtered, &self.orders);
        sorted
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect()
    }
}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical::encode(&self.dict()).hash(state);
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dict())
    }
}
