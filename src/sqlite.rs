//! SQLite implementation of the database boundary, via rusqlite.
//!
//! One connection is opened per worker. WAL mode keeps readers off the
//! writer's lock; `BEGIN IMMEDIATE` makes writer conflicts surface as
//! `SQLITE_BUSY`, which maps to [`DbError::Conflict`] and is retried by the
//! engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::db::{Connection, Database, DbError, Row, Value};

/// The nine benchmark tables, in load order.
pub const TABLES: [&str; 9] = [
    "warehouse",
    "district",
    "item",
    "customer",
    "stock",
    "orders",
    "new_order",
    "order_line",
    "history",
];

/// Schema DDL. Monetary columns are integer cents, timestamps unix seconds.
pub const SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS warehouse;
CREATE TABLE warehouse (
    w_id INTEGER PRIMARY KEY,
    w_name TEXT,
    w_street_1 TEXT,
    w_street_2 TEXT,
    w_city TEXT,
    w_state TEXT,
    w_zip TEXT,
    w_tax INTEGER,
    w_ytd INTEGER
);
DROP TABLE IF EXISTS district;
CREATE TABLE district (
    d_id INTEGER,
    d_w_id INTEGER,
    d_name TEXT,
    d_street_1 TEXT,
    d_street_2 TEXT,
    d_city TEXT,
    d_state TEXT,
    d_zip TEXT,
    d_tax INTEGER,
    d_ytd INTEGER,
    d_next_o_id INTEGER,
    PRIMARY KEY (d_w_id, d_id)
);
DROP TABLE IF EXISTS customer;
CREATE TABLE customer (
    c_id INTEGER,
    c_d_id INTEGER,
    c_w_id INTEGER,
    c_first TEXT,
    c_middle TEXT,
    c_last TEXT,
    c_street_1 TEXT,
    c_street_2 TEXT,
    c_city TEXT,
    c_state TEXT,
    c_zip TEXT,
    c_phone TEXT,
    c_since INTEGER,
    c_credit TEXT,
    c_credit_lim INTEGER,
    c_discount INTEGER,
    c_balance INTEGER,
    c_ytd_payment INTEGER,
    c_payment_cnt INTEGER,
    c_delivery_cnt INTEGER,
    c_data TEXT,
    PRIMARY KEY (c_w_id, c_d_id, c_id)
);
DROP TABLE IF EXISTS item;
CREATE TABLE item (
    i_id INTEGER PRIMARY KEY,
    i_im_id INTEGER,
    i_name TEXT,
    i_price INTEGER,
    i_data TEXT
);
DROP TABLE IF EXISTS stock;
CREATE TABLE stock (
    s_i_id INTEGER,
    s_w_id INTEGER,
    s_quantity INTEGER,
    s_dist_01 TEXT,
    s_dist_02 TEXT,
    s_dist_03 TEXT,
    s_dist_04 TEXT,
    s_dist_05 TEXT,
    s_dist_06 TEXT,
    s_dist_07 TEXT,
    s_dist_08 TEXT,
    s_dist_09 TEXT,
    s_dist_10 TEXT,
    s_ytd INTEGER,
    s_order_cnt INTEGER,
    s_remote_cnt INTEGER,
    s_data TEXT,
    PRIMARY KEY (s_w_id, s_i_id)
);
DROP TABLE IF EXISTS orders;
CREATE TABLE orders (
    o_id INTEGER,
    o_d_id INTEGER,
    o_w_id INTEGER,
    o_c_id INTEGER,
    o_entry_d INTEGER,
    o_carrier_id INTEGER,
    o_ol_cnt INTEGER,
    o_all_local INTEGER,
    PRIMARY KEY (o_w_id, o_d_id, o_id)
);
DROP TABLE IF EXISTS new_order;
CREATE TABLE new_order (
    no_o_id INTEGER,
    no_d_id INTEGER,
    no_w_id INTEGER,
    PRIMARY KEY (no_w_id, no_d_id, no_o_id)
);
DROP TABLE IF EXISTS order_line;
CREATE TABLE order_line (
    ol_o_id INTEGER,
    ol_d_id INTEGER,
    ol_w_id INTEGER,
    ol_number INTEGER,
    ol_i_id INTEGER,
    ol_supply_w_id INTEGER,
    ol_delivery_d INTEGER,
    ol_quantity INTEGER,
    ol_amount INTEGER,
    ol_dist_info TEXT,
    PRIMARY KEY (ol_w_id, ol_d_id, ol_o_id, ol_number)
);
DROP TABLE IF EXISTS history;
CREATE TABLE history (
    h_c_id INTEGER,
    h_c_d_id INTEGER,
    h_c_w_id INTEGER,
    h_d_id INTEGER,
    h_w_id INTEGER,
    h_date INTEGER,
    h_amount INTEGER,
    h_data TEXT
);
CREATE INDEX i_customer_last ON customer (c_w_id, c_d_id, c_last, c_first);
CREATE INDEX i_orders_customer ON orders (o_w_id, o_d_id, o_c_id, o_id);
"#;

/// A SQLite database file shared by all workers.
pub struct SqliteDatabase {
    path: PathBuf,
}

impl SqliteDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops and recreates the nine tables and their indexes.
    pub fn create_schema(&self) -> Result<(), DbError> {
        let conn = self.open()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_err)
    }

    fn open(&self) -> Result<rusqlite::Connection, DbError> {
        let conn = rusqlite::Connection::open(&self.path).map_err(map_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(map_err)?;
        // journal_mode reports the resulting mode as a row.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(map_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(map_err)?;
        Ok(conn)
    }
}

impl Database for SqliteDatabase {
    type Conn = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, DbError> {
        Ok(SqliteConnection { inner: self.open()? })
    }
}

pub struct SqliteConnection {
    inner: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, DbError> {
        let mut stmt = self.inner.prepare_cached(sql).map_err(map_err)?;
        stmt.execute(rusqlite::params_from_iter(params.iter()))
            .map_err(map_err)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let mut stmt = self.inner.prepare_cached(sql).map_err(map_err)?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(map_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_err)? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(column_value(row.get_ref(idx).map_err(map_err)?)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.inner
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(map_err)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.inner.execute_batch("COMMIT").map_err(map_err)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.inner.execute_batch("ROLLBACK").map_err(map_err)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Int(v) => v.to_sql(),
            Value::Text(v) => Ok(ToSqlOutput::from(v.as_str())),
            Value::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
        }
    }
}

fn column_value(value: ValueRef<'_>) -> Result<Value, DbError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Int(v)),
        ValueRef::Text(v) => Ok(Value::Text(
            String::from_utf8_lossy(v).into_owned(),
        )),
        other => Err(DbError::Failed(format!(
            "unexpected column type: {other:?}"
        ))),
    }
}

fn map_err(err: rusqlite::Error) -> DbError {
    use rusqlite::ErrorCode;
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            DbError::Conflict(err.to_string())
        }
        _ => DbError::Failed(err.to_string()),
    }
}
