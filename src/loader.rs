//! Bulk-loads generated rows into the target database.
//!
//! Tables are loaded in dependency order, streaming each generator iterator
//! through batched inserts inside chunked transactions. The loader can also
//! export the same rows as headerless CSV files, one per table with columns
//! in schema order, the plain-text bulk-load exchange format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::db::{Connection, DbError, Value};
use crate::generator::DataGenerator;
use crate::BenchError;

/// Rows per transaction during bulk load.
const CHUNK: usize = 5000;

const INSERT_WAREHOUSE: &str =
    "INSERT INTO warehouse VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const INSERT_DISTRICT: &str =
    "INSERT INTO district VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";
const INSERT_CUSTOMER: &str = "INSERT INTO customer VALUES \
     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)";
const INSERT_ITEM: &str = "INSERT INTO item VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_STOCK: &str = "INSERT INTO stock VALUES \
     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";
const INSERT_ORDER: &str = "INSERT INTO orders VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const INSERT_NEW_ORDER: &str = "INSERT INTO new_order VALUES (?1, ?2, ?3)";
const INSERT_ORDER_LINE: &str =
    "INSERT INTO order_line VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
const INSERT_HISTORY: &str = "INSERT INTO history VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Row counts per table after a load.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub tables: Vec<(&'static str, u64)>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

/// Streams generated rows into the database over one connection.
pub struct SchemaLoader<'a, C: Connection> {
    conn: &'a mut C,
}

impl<'a, C: Connection> SchemaLoader<'a, C> {
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Loads all nine tables in dependency order.
    pub fn load_all(&mut self, gen: &DataGenerator) -> Result<LoadSummary, BenchError> {
        let mut summary = LoadSummary::default();
        let mut record = |table, rows: Result<u64, DbError>| -> Result<(), BenchError> {
            let rows = rows.map_err(BenchError::Load)?;
            info!(table, rows, "loaded");
            summary.tables.push((table, rows));
            Ok(())
        };

        record(
            "warehouse",
            self.load_table(INSERT_WAREHOUSE, gen.warehouses().map(|w| {
                vec![
                    w.w_id.into(),
                    w.w_name.into(),
                    w.w_street_1.into(),
                    w.w_street_2.into(),
                    w.w_city.into(),
                    w.w_state.into(),
                    w.w_zip.into(),
                    w.w_tax.into(),
                    w.w_ytd.into(),
                ]
            })),
        )?;
        record(
            "district",
            self.load_table(INSERT_DISTRICT, gen.districts().map(|d| {
                vec![
                    d.d_id.into(),
                    d.d_w_id.into(),
                    d.d_name.into(),
                    d.d_street_1.into(),
                    d.d_street_2.into(),
                    d.d_city.into(),
                    d.d_state.into(),
                    d.d_zip.into(),
                    d.d_tax.into(),
                    d.d_ytd.into(),
                    d.d_next_o_id.into(),
                ]
            })),
        )?;
        record(
            "item",
            self.load_table(INSERT_ITEM, gen.items().map(|i| {
                vec![
                    i.i_id.into(),
                    i.i_im_id.into(),
                    i.i_name.into(),
                    i.i_price.into(),
                    i.i_data.into(),
                ]
            })),
        )?;
        record(
            "customer",
            self.load_table(INSERT_CUSTOMER, gen.customers().map(|c| {
                vec![
                    c.c_id.into(),
                    c.c_d_id.into(),
                    c.c_w_id.into(),
                    c.c_first.into(),
                    c.c_middle.into(),
                    c.c_last.into(),
                    c.c_street_1.into(),
                    c.c_street_2.into(),
                    c.c_city.into(),
                    c.c_state.into(),
                    c.c_zip.into(),
                    c.c_phone.into(),
                    c.c_since.into(),
                    c.c_credit.into(),
                    c.c_credit_lim.into(),
                    c.c_discount.into(),
                    c.c_balance.into(),
                    c.c_ytd_payment.into(),
                    c.c_payment_cnt.into(),
                    c.c_delivery_cnt.into(),
                    c.c_data.into(),
                ]
            })),
        )?;
        record(
            "stock",
            self.load_table(INSERT_STOCK, gen.stock().map(|s| {
                let mut params: Vec<Value> =
                    vec![s.s_i_id.into(), s.s_w_id.into(), s.s_quantity.into()];
                params.extend(s.s_dist.into_iter().map(Value::from));
                params.push(s.s_ytd.into());
                params.push(s.s_order_cnt.into());
                params.push(s.s_remote_cnt.into());
                params.push(s.s_data.into());
                params
            })),
        )?;
        record(
            "orders",
            self.load_table(INSERT_ORDER, gen.orders().map(|o| {
                vec![
                    o.o_id.into(),
                    o.o_d_id.into(),
                    o.o_w_id.into(),
                    o.o_c_id.into(),
                    o.o_entry_d.into(),
                    o.o_carrier_id.into(),
                    o.o_ol_cnt.into(),
                    o.o_all_local.into(),
                ]
            })),
        )?;
        record(
            "new_order",
            self.load_table(INSERT_NEW_ORDER, gen.new_orders().map(|n| {
                vec![n.no_o_id.into(), n.no_d_id.into(), n.no_w_id.into()]
            })),
        )?;
        record(
            "order_line",
            self.load_table(INSERT_ORDER_LINE, gen.order_lines().map(|l| {
                vec![
                    l.ol_o_id.into(),
                    l.ol_d_id.into(),
                    l.ol_w_id.into(),
                    l.ol_number.into(),
                    l.ol_i_id.into(),
                    l.ol_supply_w_id.into(),
                    l.ol_delivery_d.into(),
                    l.ol_quantity.into(),
                    l.ol_amount.into(),
                    l.ol_dist_info.into(),
                ]
            })),
        )?;
        record(
            "history",
            self.load_table(INSERT_HISTORY, gen.history().map(|h| {
                vec![
                    h.h_c_id.into(),
                    h.h_c_d_id.into(),
                    h.h_c_w_id.into(),
                    h.h_d_id.into(),
                    h.h_w_id.into(),
                    h.h_date.into(),
                    h.h_amount.into(),
                    h.h_data.into(),
                ]
            })),
        )?;

        Ok(summary)
    }

    fn load_table(
        &mut self,
        sql: &str,
        rows: impl Iterator<Item = Vec<Value>>,
    ) -> Result<u64, DbError> {
        let mut count = 0u64;
        self.conn.begin()?;
        for params in rows {
            if let Err(err) = self.conn.execute(sql, &params) {
                let _ = self.conn.rollback();
                return Err(err);
            }
            count += 1;
            if count % CHUNK as u64 == 0 {
                self.conn.commit()?;
                self.conn.begin()?;
            }
        }
        self.conn.commit()?;
        Ok(count)
    }
}

/// Writes one headerless CSV file per table into `dir`.
pub fn export_csv(gen: &DataGenerator, dir: &Path) -> Result<(), BenchError> {
    std::fs::create_dir_all(dir)?;

    fn write_lines<I: Iterator<Item = String>>(path: &Path, lines: I) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for line in lines {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }

    write_lines(&dir.join("warehouse.csv"), gen.warehouses().map(|r| r.csv()))?;
    write_lines(&dir.join("district.csv"), gen.districts().map(|r| r.csv()))?;
    write_lines(&dir.join("item.csv"), gen.items().map(|r| r.csv()))?;
    write_lines(&dir.join("customer.csv"), gen.customers().map(|r| r.csv()))?;
    write_lines(&dir.join("stock.csv"), gen.stock().map(|r| r.csv()))?;
    write_lines(&dir.join("orders.csv"), gen.orders().map(|r| r.csv()))?;
    write_lines(&dir.join("new_order.csv"), gen.new_orders().map(|r| r.csv()))?;
    write_lines(&dir.join("order_line.csv"), gen.order_lines().map(|r| r.csv()))?;
    write_lines(&dir.join("history.csv"), gen.history().map(|r| r.csv()))?;
    Ok(())
}
