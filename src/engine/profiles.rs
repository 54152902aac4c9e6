//! The five TPC-C transaction profiles.
//!
//! Each profile is a (parameter, executor) pair: parameters are drawn from
//! the worker's random stream into a plain input struct, and the executor
//! runs the profile's statements inside one database transaction. Keeping
//! the two apart means a conflict retry re-draws fresh parameters, and
//! tests can drive the executors with hand-built inputs.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{Outcome, TxnKind};
use crate::db::{Connection, DbError, RowExt};
use crate::generator::{DISTRICTS_PER_WAREHOUSE, ITEM_COUNT};
use crate::model::format_cents;
use crate::rng::TpccRng;

/// Item id guaranteed to miss, injected into ~1% of New-Order transactions
/// to exercise the not-found rollback path.
pub const INVALID_ITEM_ID: i64 = ITEM_COUNT + 1;

/// One requested line of a New-Order transaction.
#[derive(Debug, Clone)]
pub struct OrderLineRequest {
    pub i_id: i64,
    pub supply_w_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrderInput {
    pub w_id: i64,
    pub d_id: i64,
    pub c_id: i64,
    pub lines: Vec<OrderLineRequest>,
}

/// Customer selection: 60% by id, 40% by last name (middle match wins).
#[derive(Debug, Clone)]
pub enum CustomerSelector {
    ById(i64),
    ByLastName(String),
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub w_id: i64,
    pub d_id: i64,
    /// Paying customer's coordinates; remote for 15% of transactions.
    pub c_w_id: i64,
    pub c_d_id: i64,
    pub selector: CustomerSelector,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct OrderStatusInput {
    pub w_id: i64,
    pub d_id: i64,
    pub selector: CustomerSelector,
}

#[derive(Debug, Clone)]
pub struct DeliveryInput {
    pub w_id: i64,
    pub carrier_id: i64,
}

#[derive(Debug, Clone)]
pub struct StockLevelInput {
    pub w_id: i64,
    pub d_id: i64,
    pub threshold: i64,
}

/// A fully parameterized transaction, ready to execute.
#[derive(Debug, Clone)]
pub enum TxnInput {
    NewOrder(NewOrderInput),
    Payment(PaymentInput),
    OrderStatus(OrderStatusInput),
    Delivery(DeliveryInput),
    StockLevel(StockLevelInput),
}

impl TxnInput {
    /// Draws fresh parameters for a transaction of the given kind.
    pub fn build(kind: TxnKind, rng: &mut TpccRng, home_w: i64, warehouses: i64) -> TxnInput {
        match kind {
            TxnKind::NewOrder => TxnInput::NewOrder(build_new_order(rng, home_w, warehouses)),
            TxnKind::Payment => TxnInput::Payment(build_payment(rng, home_w, warehouses)),
            TxnKind::OrderStatus => TxnInput::OrderStatus(OrderStatusInput {
                w_id: home_w,
                d_id: rng.uniform(1, DISTRICTS_PER_WAREHOUSE),
                selector: build_selector(rng),
            }),
            TxnKind::Delivery => TxnInput::Delivery(DeliveryInput {
                w_id: home_w,
                carrier_id: rng.uniform(1, 10),
            }),
            TxnKind::StockLevel => TxnInput::StockLevel(StockLevelInput {
                w_id: home_w,
                d_id: rng.uniform(1, DISTRICTS_PER_WAREHOUSE),
                threshold: rng.uniform(10, 20),
            }),
        }
    }
}

fn build_new_order(rng: &mut TpccRng, home_w: i64, warehouses: i64) -> NewOrderInput {
    let d_id = rng.uniform(1, DISTRICTS_PER_WAREHOUSE);
    let c_id = rng.customer_id();
    let ol_cnt = rng.uniform(5, 15);
    let inject_invalid = rng.uniform(1, 100) == 1;
    let lines = (1..=ol_cnt)
        .map(|n| {
            let i_id = if inject_invalid && n == ol_cnt {
                INVALID_ITEM_ID
            } else {
                rng.item_id()
            };
            // 1% of lines are supplied by a remote warehouse.
            let supply_w_id = if warehouses > 1 && rng.uniform(1, 100) == 1 {
                other_warehouse(rng, home_w, warehouses)
            } else {
                home_w
            };
            OrderLineRequest {
                i_id,
                supply_w_id,
                quantity: rng.uniform(1, 10),
            }
        })
        .collect();
    NewOrderInput {
        w_id: home_w,
        d_id,
        c_id,
        lines,
    }
}

fn build_payment(rng: &mut TpccRng, home_w: i64, warehouses: i64) -> PaymentInput {
    let d_id = rng.uniform(1, DISTRICTS_PER_WAREHOUSE);
    // 85% of customers pay through their home warehouse.
    let (c_w_id, c_d_id) = if rng.uniform(1, 100) <= 85 || warehouses == 1 {
        (home_w, d_id)
    } else {
        (
            other_warehouse(rng, home_w, warehouses),
            rng.uniform(1, DISTRICTS_PER_WAREHOUSE),
        )
    };
    PaymentInput {
        w_id: home_w,
        d_id,
        c_w_id,
        c_d_id,
        selector: build_selector(rng),
        amount: rng.uniform(100, 500_000),
    }
}

fn build_selector(rng: &mut TpccRng) -> CustomerSelector {
    if rng.uniform(1, 100) <= 60 {
        CustomerSelector::ById(rng.customer_id())
    } else {
        CustomerSelector::ByLastName(TpccRng::last_name(rng.last_name_index()))
    }
}

fn other_warehouse(rng: &mut TpccRng, home_w: i64, warehouses: i64) -> i64 {
    loop {
        let w = rng.uniform(1, warehouses);
        if w != home_w {
            return w;
        }
    }
}

/// Stock replenishment rule: quantities never sink below the threshold
/// without wrapping back up by 91.
pub fn replenish(quantity: i64, ordered: i64) -> i64 {
    if quantity >= ordered + 10 {
        quantity - ordered
    } else {
        quantity - ordered + 91
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn missing(what: &str) -> DbError {
    DbError::Failed(format!("{what} not found"))
}

/// Executes one parameterized transaction against the database.
pub fn execute<C: Connection>(conn: &mut C, input: &TxnInput) -> Result<Outcome, DbError> {
    match input {
        TxnInput::NewOrder(input) => new_order(conn, input),
        TxnInput::Payment(input) => payment(conn, input),
        TxnInput::OrderStatus(input) => order_status(conn, input),
        TxnInput::Delivery(input) => delivery(conn, input),
        TxnInput::StockLevel(input) => stock_level(conn, input),
    }
}

fn new_order<C: Connection>(conn: &mut C, input: &NewOrderInput) -> Result<Outcome, DbError> {
    conn.begin()?;
    match new_order_body(conn, input) {
        // An unknown item is a valid outcome, not an error: roll the whole
        // order back and report it as such.
        Ok(None) => {
            conn.rollback()?;
            Ok(Outcome::RolledBack)
        }
        Ok(Some(total)) => {
            conn.commit()?;
            debug!(w_id = input.w_id, d_id = input.d_id, total = %format_cents(total), "new order");
            Ok(Outcome::Committed)
        }
        Err(err) => {
            let _ = conn.rollback();
            Err(err)
        }
    }
}

fn new_order_body<C: Connection>(
    conn: &mut C,
    input: &NewOrderInput,
) -> Result<Option<i64>, DbError> {
    let w_tax = conn
        .query_one(
            "SELECT w_tax FROM warehouse WHERE w_id = ?1",
            &[input.w_id.into()],
        )?
        .ok_or_else(|| missing("warehouse"))?
        .int(0)?;

    let district = conn
        .query_one(
            "SELECT d_tax, d_next_o_id FROM district WHERE d_w_id = ?1 AND d_id = ?2",
            &[input.w_id.into(), input.d_id.into()],
        )?
        .ok_or_else(|| missing("district"))?;
    let d_tax = district.int(0)?;
    let o_id = district.int(1)?;
    conn.execute(
        "UPDATE district SET d_next_o_id = d_next_o_id + 1 WHERE d_w_id = ?1 AND d_id = ?2",
        &[input.w_id.into(), input.d_id.into()],
    )?;

    let customer = conn
        .query_one(
            "SELECT c_discount, c_credit FROM customer \
             WHERE c_w_id = ?1 AND c_d_id = ?2 AND c_id = ?3",
            &[input.w_id.into(), input.d_id.into(), input.c_id.into()],
        )?
        .ok_or_else(|| missing("customer"))?;
    let c_discount = customer.int(0)?;

    let all_local = input.lines.iter().all(|l| l.supply_w_id == input.w_id);
    conn.execute(
        "INSERT INTO orders (o_id, o_d_id, o_w_id, o_c_id, o_entry_d, o_carrier_id, o_ol_cnt, o_all_local) \
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
        &[
            o_id.into(),
            input.d_id.into(),
            input.w_id.into(),
            input.c_id.into(),
            now_secs().into(),
            (input.lines.len() as i64).into(),
            i64::from(all_local).into(),
        ],
    )?;
    conn.execute(
        "INSERT INTO new_order (no_o_id, no_d_id, no_w_id) VALUES (?1, ?2, ?3)",
        &[o_id.into(), input.d_id.into(), input.w_id.into()],
    )?;

    let dist_column = format!("s_dist_{:02}", input.d_id);
    let stock_sql = format!(
        "SELECT s_quantity, {dist_column} FROM stock WHERE s_i_id = ?1 AND s_w_id = ?2"
    );

    let mut total = 0i64;
    for (idx, line) in input.lines.iter().enumerate() {
        let Some(item) = conn.query_one(
            "SELECT i_price FROM item WHERE i_id = ?1",
            &[line.i_id.into()],
        )?
        else {
            return Ok(None);
        };
        let i_price = item.int(0)?;

        let stock = conn
            .query_one(&stock_sql, &[line.i_id.into(), line.supply_w_id.into()])?
            .ok_or_else(|| missing("stock"))?;
        let s_quantity = stock.int(0)?;
        let dist_info = stock.text(1)?.to_owned();

        let remote = i64::from(line.supply_w_id != input.w_id);
        conn.execute(
            "UPDATE stock SET s_quantity = ?1, s_ytd = s_ytd + ?2, \
             s_order_cnt = s_order_cnt + 1, s_remote_cnt = s_remote_cnt + ?3 \
             WHERE s_i_id = ?4 AND s_w_id = ?5",
            &[
                replenish(s_quantity, line.quantity).into(),
                line.quantity.into(),
                remote.into(),
                line.i_id.into(),
                line.supply_w_id.into(),
            ],
        )?;

        let ol_amount = line.quantity * i_price;
        conn.execute(
            "INSERT INTO order_line (ol_o_id, ol_d_id, ol_w_id, ol_number, ol_i_id, \
             ol_supply_w_id, ol_delivery_d, ol_quantity, ol_amount, ol_dist_info) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)",
            &[
                o_id.into(),
                input.d_id.into(),
                input.w_id.into(),
                (idx as i64 + 1).into(),
                line.i_id.into(),
                line.supply_w_id.into(),
                line.quantity.into(),
                ol_amount.into(),
                dist_info.into(),
            ],
        )?;
        total += ol_amount;
    }

    // Total charge with discount and warehouse+district tax applied.
    let total = total * (10_000 - c_discount) / 10_000 * (10_000 + w_tax + d_tax) / 10_000;
    Ok(Some(total))
}

fn payment<C: Connection>(conn: &mut C, input: &PaymentInput) -> Result<Outcome, DbError> {
    conn.begin()?;
    match payment_body(conn, input) {
        Ok(true) => {
            conn.commit()?;
            Ok(Outcome::Committed)
        }
        Ok(false) => {
            conn.rollback()?;
            Ok(Outcome::RolledBack)
        }
        Err(err) => {
            let _ = conn.rollback();
            Err(err)
        }
    }
}

fn payment_body<C: Connection>(conn: &mut C, input: &PaymentInput) -> Result<bool, DbError> {
    let w_name = conn
        .query_one(
            "SELECT w_name FROM warehouse WHERE w_id = ?1",
            &[input.w_id.into()],
        )?
        .ok_or_else(|| missing("warehouse"))?
        .text(0)?
        .to_owned();
    conn.execute(
        "UPDATE warehouse SET w_ytd = w_ytd + ?1 WHERE w_id = ?2",
        &[input.amount.into(), input.w_id.into()],
    )?;

    let d_name = conn
        .query_one(
            "SELECT d_name FROM district WHERE d_w_id = ?1 AND d_id = ?2",
            &[input.w_id.into(), input.d_id.into()],
        )?
        .ok_or_else(|| missing("district"))?
        .text(0)?
        .to_owned();
    conn.execute(
        "UPDATE district SET d_ytd = d_ytd + ?1 WHERE d_w_id = ?2 AND d_id = ?3",
        &[input.amount.into(), input.w_id.into(), input.d_id.into()],
    )?;

    let Some(c_id) = resolve_customer(conn, input.c_w_id, input.c_d_id, &input.selector)? else {
        return Ok(false);
    };
    let c_credit = conn
        .query_one(
            "SELECT c_credit FROM customer WHERE c_w_id = ?1 AND c_d_id = ?2 AND c_id = ?3",
            &[input.c_w_id.into(), input.c_d_id.into(), c_id.into()],
        )?
        .ok_or_else(|| missing("customer"))?
        .text(0)?
        .to_owned();

    if c_credit == "BC" {
        // Bad credit: prepend a payment note to c_data, bounded at 500.
        let note = format!(
            "{c_id} {} {} {} {} {}",
            input.c_d_id,
            input.c_w_id,
            input.d_id,
            input.w_id,
            format_cents(input.amount)
        );
        conn.execute(
            "UPDATE customer SET c_balance = c_balance - ?1, c_ytd_payment = c_ytd_payment + ?1, \
             c_payment_cnt = c_payment_cnt + 1, c_data = substr(?2 || ' ' || c_data, 1, 500) \
             WHERE c_w_id = ?3 AND c_d_id = ?4 AND c_id = ?5",
            &[
                input.amount.into(),
                note.into(),
                input.c_w_id.into(),
                input.c_d_id.into(),
                c_id.into(),
            ],
        )?;
    } else {
        conn.execute(
            "UPDATE customer SET c_balance = c_balance - ?1, c_ytd_payment = c_ytd_payment + ?1, \
             c_payment_cnt = c_payment_cnt + 1 \
             WHERE c_w_id = ?2 AND c_d_id = ?3 AND c_id = ?4",
            &[
                input.amount.into(),
                input.c_w_id.into(),
                input.c_d_id.into(),
                c_id.into(),
            ],
        )?;
    }

    conn.execute(
        "INSERT INTO history (h_c_id, h_c_d_id, h_c_w_id, h_d_id, h_w_id, h_date, h_amount, h_data) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        &[
            c_id.into(),
            input.c_d_id.into(),
            input.c_w_id.into(),
            input.d_id.into(),
            input.w_id.into(),
            now_secs().into(),
            input.amount.into(),
            format!("{w_name}    {d_name}").into(),
        ],
    )?;
    Ok(true)
}

/// Resolves the target customer id; by-name selection takes the middle row
/// of all customers sharing the last name, ordered by first name.
fn resolve_customer<C: Connection>(
    conn: &mut C,
    c_w_id: i64,
    c_d_id: i64,
    selector: &CustomerSelector,
) -> Result<Option<i64>, DbError> {
    match selector {
        CustomerSelector::ById(c_id) => Ok(Some(*c_id)),
        CustomerSelector::ByLastName(name) => {
            let rows = conn.query(
                "SELECT c_id FROM customer \
                 WHERE c_w_id = ?1 AND c_d_id = ?2 AND c_last = ?3 ORDER BY c_first",
                &[c_w_id.into(), c_d_id.into(), name.as_str().into()],
            )?;
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(Some(rows[rows.len() / 2].int(0)?))
        }
    }
}

fn order_status<C: Connection>(conn: &mut C, input: &OrderStatusInput) -> Result<Outcome, DbError> {
    conn.begin()?;
    match order_status_body(conn, input) {
        Ok(true) => {
            conn.commit()?;
            Ok(Outcome::Committed)
        }
        Ok(false) => {
            conn.rollback()?;
            Ok(Outcome::RolledBack)
        }
        Err(err) => {
            let _ = conn.rollback();
            Err(err)
        }
    }
}

fn order_status_body<C: Connection>(
    conn: &mut C,
    input: &OrderStatusInput,
) -> Result<bool, DbError> {
    let Some(c_id) = resolve_customer(conn, input.w_id, input.d_id, &input.selector)? else {
        return Ok(false);
    };
    let last_order = conn.query_one(
        "SELECT o_id, o_entry_d, o_carrier_id FROM orders \
         WHERE o_w_id = ?1 AND o_d_id = ?2 AND o_c_id = ?3 ORDER BY o_id DESC LIMIT 1",
        &[input.w_id.into(), input.d_id.into(), c_id.into()],
    )?;
    if let Some(order) = last_order {
        let o_id = order.int(0)?;
        let lines = conn.query(
            "SELECT ol_i_id, ol_supply_w_id, ol_quantity, ol_amount, ol_delivery_d \
             FROM order_line WHERE ol_w_id = ?1 AND ol_d_id = ?2 AND ol_o_id = ?3",
            &[input.w_id.into(), input.d_id.into(), o_id.into()],
        )?;
        debug!(c_id, o_id, lines = lines.len(), "order status");
    }
    Ok(true)
}

fn delivery<C: Connection>(conn: &mut C, input: &DeliveryInput) -> Result<Outcome, DbError> {
    conn.begin()?;
    match delivery_body(conn, input) {
        Ok(delivered) => {
            conn.commit()?;
            debug!(w_id = input.w_id, delivered, "delivery");
            Ok(Outcome::Committed)
        }
        Err(err) => {
            let _ = conn.rollback();
            Err(err)
        }
    }
}

fn delivery_body<C: Connection>(conn: &mut C, input: &DeliveryInput) -> Result<u32, DbError> {
    let mut delivered = 0;
    for d_id in 1..=DISTRICTS_PER_WAREHOUSE {
        // Oldest undelivered order for this district, if any.
        let oldest = conn
            .query_one(
                "SELECT MIN(no_o_id) FROM new_order WHERE no_w_id = ?1 AND no_d_id = ?2",
                &[input.w_id.into(), d_id.into()],
            )?
            .ok_or_else(|| missing("new_order aggregate"))?
            .opt_int(0)?;
        let Some(o_id) = oldest else {
            continue;
        };

        conn.execute(
            "DELETE FROM new_order WHERE no_o_id = ?1 AND no_d_id = ?2 AND no_w_id = ?3",
            &[o_id.into(), d_id.into(), input.w_id.into()],
        )?;
        let c_id = conn
            .query_one(
                "SELECT o_c_id FROM orders WHERE o_w_id = ?1 AND o_d_id = ?2 AND o_id = ?3",
                &[input.w_id.into(), d_id.into(), o_id.into()],
            )?
            .ok_or_else(|| missing("order"))?
            .int(0)?;
        conn.execute(
            "UPDATE orders SET o_carrier_id = ?1 WHERE o_w_id = ?2 AND o_d_id = ?3 AND o_id = ?4",
            &[
                input.carrier_id.into(),
                input.w_id.into(),
                d_id.into(),
                o_id.into(),
            ],
        )?;
        conn.execute(
            "UPDATE order_line SET ol_delivery_d = ?1 \
             WHERE ol_w_id = ?2 AND ol_d_id = ?3 AND ol_o_id = ?4",
            &[
                now_secs().into(),
                input.w_id.into(),
                d_id.into(),
                o_id.into(),
            ],
        )?;
        let amount = conn
            .query_one(
                "SELECT IFNULL(SUM(ol_amount), 0) FROM order_line \
                 WHERE ol_w_id = ?1 AND ol_d_id = ?2 AND ol_o_id = ?3",
                &[input.w_id.into(), d_id.into(), o_id.into()],
            )?
            .ok_or_else(|| missing("order_line aggregate"))?
            .int(0)?;
        conn.execute(
            "UPDATE customer SET c_balance = c_balance + ?1, c_delivery_cnt = c_delivery_cnt + 1 \
             WHERE c_w_id = ?2 AND c_d_id = ?3 AND c_id = ?4",
            &[
                amount.into(),
                input.w_id.into(),
                d_id.into(),
                c_id.into(),
            ],
        )?;
        delivered += 1;
    }
    Ok(delivered)
}

fn stock_level<C: Connection>(conn: &mut C, input: &StockLevelInput) -> Result<Outcome, DbError> {
    conn.begin()?;
    match stock_level_body(conn, input) {
        Ok(low) => {
            conn.commit()?;
            debug!(
                w_id = input.w_id,
                d_id = input.d_id,
                threshold = input.threshold,
                low,
                "stock level"
            );
            Ok(Outcome::Committed)
        }
        Err(err) => {
            let _ = conn.rollback();
            Err(err)
        }
    }
}

fn stock_level_body<C: Connection>(conn: &mut C, input: &StockLevelInput) -> Result<i64, DbError> {
    let next_o_id = conn
        .query_one(
            "SELECT d_next_o_id FROM district WHERE d_w_id = ?1 AND d_id = ?2",
            &[input.w_id.into(), input.d_id.into()],
        )?
        .ok_or_else(|| missing("district"))?
        .int(0)?;
    // Distinct items of the district's last 20 orders below the threshold.
    let row = conn
        .query_one(
            "SELECT COUNT(DISTINCT ol_i_id) FROM order_line \
             JOIN stock ON s_w_id = ?1 AND s_i_id = ol_i_id \
             WHERE ol_w_id = ?1 AND ol_d_id = ?2 \
               AND ol_o_id >= ?3 AND ol_o_id < ?4 AND s_quantity < ?5",
            &[
                input.w_id.into(),
                input.d_id.into(),
                (next_o_id - 20).into(),
                next_o_id.into(),
                input.threshold.into(),
            ],
        )?
        .ok_or_else(|| missing("stock aggregate"))?;
    row.int(0)
}
