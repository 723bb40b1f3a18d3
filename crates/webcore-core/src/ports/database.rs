use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::kernel::error::Result;
use crate::ports::error::PortError;

/// A document/row: column name to value.
pub type DbMap = Map<String, Value>;

/// Comparison applied by a [`DbExpression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl DbOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbOp::Eq => "=",
            DbOp::Ne => "!=",
            DbOp::Gt => ">",
            DbOp::Gte => ">=",
            DbOp::Lt => "<",
            DbOp::Lte => "<=",
            DbOp::In => "in",
        }
    }
}

impl FromStr for DbOp {
    type Err = PortError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "" => Ok(DbOp::Eq),
            "!=" | "<>" => Ok(DbOp::Ne),
            ">" => Ok(DbOp::Gt),
            ">=" => Ok(DbOp::Gte),
            "<" => Ok(DbOp::Lt),
            "<=" => Ok(DbOp::Lte),
            "in" => Ok(DbOp::In),
            other => Err(PortError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for DbOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter term: `expr op args`. `expr` is a column name; `in` takes any
/// number of arguments, the other operators exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct DbExpression {
    pub expr: String,
    pub op: DbOp,
    pub args: Vec<Value>,
}

impl DbExpression {
    /// Build from an operator string such as `">="`.
    pub fn new(expr: impl Into<String>, op: &str, args: Vec<Value>) -> std::result::Result<Self, PortError> {
        let expression = Self {
            expr: expr.into(),
            op: op.parse()?,
            args,
        };
        expression.validate()?;
        Ok(expression)
    }

    pub fn equals(expr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            expr: expr.into(),
            op: DbOp::Eq,
            args: vec![value.into()],
        }
    }

    pub fn is_in(expr: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            expr: expr.into(),
            op: DbOp::In,
            args: values,
        }
    }

    /// Check the argument count against the operator.
    pub fn validate(&self) -> std::result::Result<(), PortError> {
        if self.expr.is_empty() {
            return Err(PortError::invalid_filter("", "empty column name"));
        }
        if self.op != DbOp::In && self.args.len() != 1 {
            return Err(PortError::invalid_filter(
                &self.expr,
                format!("operator '{}' takes exactly one argument, got {}", self.op, self.args.len()),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Projection, filter, ordering and paging for [`Database::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Columns to return; empty returns every column.
    pub columns: Vec<String>,
    pub filter: Vec<DbExpression>,
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub skip: u64,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, expression: DbExpression) -> Self {
        self.filter.push(expression);
        self
    }

    pub fn sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }
}

/// Table/collection oriented database access.
#[async_trait]
pub trait Database: Send + Sync {
    async fn ping(&self) -> Result<()>;

    fn driver(&self) -> &str;

    /// Database name
    fn name(&self) -> &str;

    async fn count(&self, table: &str, filter: &[DbExpression]) -> Result<u64>;

    async fn find(&self, table: &str, options: &FindOptions) -> Result<Vec<DbMap>>;

    async fn find_one(&self, table: &str, options: &FindOptions) -> Result<Option<DbMap>>;

    /// Insert a row and return its identifier.
    async fn insert_one(&self, table: &str, data: DbMap) -> Result<Value>;

    /// Merge `data` into every matching row; returns the number updated.
    async fn update(&self, table: &str, filter: &[DbExpression], data: DbMap) -> Result<u64>;

    async fn update_one(&self, table: &str, filter: &[DbExpression], data: DbMap) -> Result<u64>;

    async fn delete(&self, table: &str, filter: &[DbExpression]) -> Result<u64>;

    async fn delete_one(&self, table: &str, filter: &[DbExpression]) -> Result<u64>;
}

/// Convert a serializable struct to a row. `None` fields become nulls unless
/// skipped with `#[serde(skip_serializing_if = ...)]`.
pub fn to_db_map<T: Serialize>(value: &T) -> Result<DbMap> {
    match serde_json::to_value(value).map_err(PortError::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(PortError::invalid_filter("<row>", "value does not serialize to an object").into()),
    }
}

/// Convert a row back into a struct.
pub fn from_db_map<T: DeserializeOwned>(row: DbMap) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row)).map_err(PortError::from)?)
}
