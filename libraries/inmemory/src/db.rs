//! In-process table store behind the [`Database`] port.
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use webcore_core::kernel::error::Result;
use webcore_core::library_system::{Connector, Library, LibraryArgs};
use webcore_core::ports::{Database, DbExpression, DbMap, DbOp, FindOptions, PortError, SortOrder};

/// Column holding the generated row id.
pub const ID_COLUMN: &str = "_id";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct MemoryDatabaseConfig {
    host: String,
    name: String,
}

impl Default for MemoryDatabaseConfig {
    fn default() -> Self {
        Self {
            host: "memory".to_string(),
            name: "app".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<DbMap>,
    next_id: u64,
}

/// Connection-bearing in-memory database.
///
/// Rows live in per-table vectors. Every operation other than `driver` and
/// `name` fails while the library is disconnected.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    config: OnceLock<MemoryDatabaseConfig>,
    connected: AtomicBool,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryDatabase {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> std::result::Result<(), PortError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PortError::unavailable("database", "not connected"))
        }
    }

    async fn update_rows(&self, table: &str, filter: &[DbExpression], data: DbMap, limit: Option<usize>) -> Result<u64> {
        self.ensure_connected()?;
        validate_filter(filter)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in table.rows.iter_mut() {
            if limit.is_some_and(|limit| updated >= limit) {
                break;
            }
            if row_matches(row, filter) {
                for (column, value) in &data {
                    if column != ID_COLUMN {
                        row.insert(column.clone(), value.clone());
                    }
                }
                updated += 1;
            }
        }
        Ok(updated as u64)
    }

    async fn delete_rows(&self, table: &str, filter: &[DbExpression], limit: Option<usize>) -> Result<u64> {
        self.ensure_connected()?;
        validate_filter(filter)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut deleted = 0;
        table.rows.retain(|row| {
            if limit.is_some_and(|limit| deleted >= limit) || !row_matches(row, filter) {
                return true;
            }
            deleted += 1;
            false
        });
        Ok(deleted as u64)
    }
}

#[async_trait]
impl Library for MemoryDatabase {
    fn kind(&self) -> &str {
        "memory database"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: MemoryDatabaseConfig = args.config_as("db:memory")?;
        debug!("Memory database '{}' configured for host {}", config.name, config.host);
        let _ = self.config.set(config);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.tables.write().await.clear();
        Ok(())
    }

    fn connector(&self) -> Option<&dyn Connector> {
        Some(self)
    }

    fn into_database(self: Arc<Self>) -> Option<Arc<dyn Database>> {
        Some(self)
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Memory database '{}' connected", self.name());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!("Memory database '{}' disconnected", self.name());
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn ping(&self) -> Result<()> {
        Ok(self.ensure_connected()?)
    }

    fn driver(&self) -> &str {
        "memory"
    }

    fn name(&self) -> &str {
        self.config.get().map(|c| c.name.as_str()).unwrap_or("app")
    }

    async fn count(&self, table: &str, filter: &[DbExpression]) -> Result<u64> {
        self.ensure_connected()?;
        validate_filter(filter)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map_or(0, |t| t.rows.iter().filter(|row| row_matches(row, filter)).count()) as u64)
    }

    async fn find(&self, table: &str, options: &FindOptions) -> Result<Vec<DbMap>> {
        self.ensure_connected()?;
        validate_filter(&options.filter)?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table).map(|t| &t.rows) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<&DbMap> = rows.iter().filter(|row| row_matches(row, &options.filter)).collect();
        if !options.sort.is_empty() {
            selected.sort_by(|a, b| compare_rows(a, b, &options.sort));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| project(row, &options.columns))
            .collect())
    }

    async fn find_one(&self, table: &str, options: &FindOptions) -> Result<Option<DbMap>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.find(table, &options).await?.into_iter().next())
    }

    async fn insert_one(&self, table: &str, mut data: DbMap) -> Result<Value> {
        self.ensure_connected()?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(table.to_string()).or_default();
        table.next_id += 1;
        let id = data
            .entry(ID_COLUMN.to_string())
            .or_insert_with(|| Value::from(table.next_id))
            .clone();
        table.rows.push(data);
        Ok(id)
    }

    async fn update(&self, table: &str, filter: &[DbExpression], data: DbMap) -> Result<u64> {
        self.update_rows(table, filter, data, None).await
    }

    async fn update_one(&self, table: &str, filter: &[DbExpression], data: DbMap) -> Result<u64> {
        self.update_rows(table, filter, data, Some(1)).await
    }

    async fn delete(&self, table: &str, filter: &[DbExpression]) -> Result<u64> {
        self.delete_rows(table, filter, None).await
    }

    async fn delete_one(&self, table: &str, filter: &[DbExpression]) -> Result<u64> {
        self.delete_rows(table, filter, Some(1)).await
    }
}

fn validate_filter(filter: &[DbExpression]) -> std::result::Result<(), PortError> {
    filter.iter().try_for_each(DbExpression::validate)
}

/// Every expression holds for `row`. The filter must already be validated.
fn row_matches(row: &DbMap, filter: &[DbExpression]) -> bool {
    filter.iter().all(|expression| {
        let value = row.get(&expression.expr).unwrap_or(&Value::Null);
        expression_holds(value, expression)
    })
}

fn expression_holds(value: &Value, expression: &DbExpression) -> bool {
    if expression.op == DbOp::In {
        return expression.args.iter().any(|arg| values_equal(value, arg));
    }
    let Some(arg) = expression.args.first() else {
        return false;
    };
    match expression.op {
        DbOp::Eq => values_equal(value, arg),
        DbOp::Ne => !values_equal(value, arg),
        DbOp::Gt => compare_values(value, arg) == Some(CmpOrdering::Greater),
        DbOp::Gte => matches!(compare_values(value, arg), Some(CmpOrdering::Greater | CmpOrdering::Equal)),
        DbOp::Lt => compare_values(value, arg) == Some(CmpOrdering::Less),
        DbOp::Lte => matches!(compare_values(value, arg), Some(CmpOrdering::Less | CmpOrdering::Equal)),
        DbOp::In => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(CmpOrdering::Equal),
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexically, booleans false < true.
/// Values of different kinds are unordered.
fn compare_values(a: &Value, b: &Value) -> Option<CmpOrdering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(CmpOrdering::Equal),
        _ => None,
    }
}

/// Multi-column ordering; nulls and unordered values sort first.
fn compare_rows(a: &DbMap, b: &DbMap, sort: &[(String, SortOrder)]) -> CmpOrdering {
    for (column, order) in sort {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        let ordering = match compare_values(left, right) {
            Some(ordering) => ordering,
            None => match (left.is_null(), right.is_null()) {
                (true, false) => CmpOrdering::Less,
                (false, true) => CmpOrdering::Greater,
                _ => CmpOrdering::Equal,
            },
        };
        let ordering = match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

fn project(row: &DbMap, columns: &[String]) -> DbMap {
    if columns.is_empty() {
        return row.clone();
    }
    columns
        .iter()
        .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
        .collect()
}
