//! Post-run consistency verification.
//!
//! Twelve read-only aggregate checks over the final database state, each a
//! query plus a comparison predicate, run uniformly from a single table.
//! Every (warehouse, district) pair is enumerated, and one failing check
//! never stops the rest: the report is exhaustive. The checks assume a
//! quiescent database, so they must only run after every worker has joined.

use tracing::{info, warn};

use crate::db::{Connection, DbError, RowExt, Value};
use crate::generator::DISTRICTS_PER_WAREHOUSE;

/// One observed inequality, with the identifiers it was found at.
#[derive(Debug)]
pub struct CheckViolation {
    pub warehouse: i64,
    /// None for warehouse-level checks.
    pub district: Option<i64>,
    pub detail: String,
}

/// Outcome of a single check over the whole database.
#[derive(Debug)]
pub struct CheckResult {
    pub id: u8,
    pub name: &'static str,
    pub violations: Vec<CheckViolation>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

type CheckFn = fn(&ConsistencyChecker, &mut dyn Connection) -> Result<Vec<CheckViolation>, DbError>;

const CHECKS: [(u8, &str, CheckFn); 12] = [
    (1, "district order counter", check_order_counter),
    (2, "new-order contiguity", check_new_order_contiguity),
    (3, "order line counts per order", check_order_line_counts),
    (4, "undelivered orders vs new-order rows", check_undelivered_orders),
    (5, "customer balances", check_customer_balances),
    (6, "warehouse ytd vs district ytd", check_warehouse_district_ytd),
    (7, "warehouse ytd vs history", check_warehouse_history),
    (8, "district ytd vs history", check_district_history),
    (9, "order line totals per district", check_district_line_totals),
    (10, "payment counts vs history rows", check_payment_counts),
    (11, "delivery counts vs order bookkeeping", check_delivery_counts),
    (12, "stock remote counts vs remote lines", check_remote_counts),
];

/// Runs the twelve invariant checks against a quiescent database.
pub struct ConsistencyChecker {
    warehouses: i64,
}

impl ConsistencyChecker {
    pub fn new(warehouses: i64) -> Self {
        Self { warehouses }
    }

    /// Runs every check independently; a query failure fails that check
    /// alone and the remaining checks still run.
    pub fn run_all(&self, conn: &mut dyn Connection) -> Vec<CheckResult> {
        CHECKS
            .iter()
            .map(|&(id, name, check)| {
                let violations = match check(self, conn) {
                    Ok(violations) => violations,
                    Err(err) => vec![CheckViolation {
                        warehouse: 0,
                        district: None,
                        detail: format!("check query failed: {err}"),
                    }],
                };
                if violations.is_empty() {
                    info!(id, name, "check passed");
                } else {
                    warn!(id, name, violations = violations.len(), "check FAILED");
                }
                CheckResult { id, name, violations }
            })
            .collect()
    }

    fn warehouse_ids(&self) -> impl Iterator<Item = i64> {
        1..=self.warehouses
    }

    fn district_ids(&self) -> impl Iterator<Item = (i64, i64)> {
        let warehouses = self.warehouses;
        (1..=warehouses).flat_map(|w| (1..=DISTRICTS_PER_WAREHOUSE).map(move |d| (w, d)))
    }
}

fn params(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|&v| Value::Int(v)).collect()
}

fn district_violation(w: i64, d: i64, detail: String) -> CheckViolation {
    CheckViolation {
        warehouse: w,
        district: Some(d),
        detail,
    }
}

/// 1: `d_next_o_id - 1 = max(o_id) = count(distinct o_id)` per district.
fn check_order_counter(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let next = conn
            .query_one(
                "SELECT d_next_o_id FROM district WHERE d_w_id = ?1 AND d_id = ?2",
                &params(&[w, d]),
            )?
            .map(|row| row.int(0))
            .transpose()?;
        let Some(next) = next else {
            violations.push(district_violation(w, d, "district row missing".into()));
            continue;
        };
        let row = conn
            .query_one(
                "SELECT MAX(o_id), COUNT(DISTINCT o_id) FROM orders \
                 WHERE o_w_id = ?1 AND o_d_id = ?2",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("orders aggregate returned no row".into()))?;
        let max_o_id = row.opt_int(0)?.unwrap_or(0);
        let count = row.int(1)?;
        if next - 1 != max_o_id || next - 1 != count {
            violations.push(district_violation(
                w,
                d,
                format!("d_next_o_id={next} max(o_id)={max_o_id} count(distinct o_id)={count}"),
            ));
        }
    }
    Ok(violations)
}

/// 2: `max(no_o_id) - min(no_o_id) + 1 = count(*)` per district with
/// pending orders (no gaps in the new-order id range).
fn check_new_order_contiguity(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT MAX(no_o_id), MIN(no_o_id), COUNT(*) FROM new_order \
                 WHERE no_w_id = ?1 AND no_d_id = ?2",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("new_order aggregate returned no row".into()))?;
        let count = row.int(2)?;
        if count == 0 {
            continue;
        }
        let max = row.int(0)?;
        let min = row.int(1)?;
        if max - min + 1 != count {
            violations.push(district_violation(
                w,
                d,
                format!("max={max} min={min} count={count}"),
            ));
        }
    }
    Ok(violations)
}

/// 3: every order's `o_ol_cnt` matches its actual order-line count.
fn check_order_line_counts(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let mismatched = conn
            .query_one(
                "SELECT COUNT(*) FROM orders o \
                 WHERE o.o_w_id = ?1 AND o.o_d_id = ?2 AND o.o_ol_cnt <> \
                   (SELECT COUNT(*) FROM order_line ol \
                    WHERE ol.ol_w_id = o.o_w_id AND ol.ol_d_id = o.o_d_id \
                      AND ol.ol_o_id = o.o_id)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("orders aggregate returned no row".into()))?
            .int(0)?;
        if mismatched != 0 {
            violations.push(district_violation(
                w,
                d,
                format!("{mismatched} orders with mismatched line counts"),
            ));
        }
    }
    Ok(violations)
}

/// 4: every undelivered order has exactly one new-order row and vice versa.
fn check_undelivered_orders(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT COUNT(*) FROM orders \
                    WHERE o_w_id = ?1 AND o_d_id = ?2 AND o_carrier_id IS NULL), \
                   (SELECT COUNT(*) FROM new_order \
                    WHERE no_w_id = ?1 AND no_d_id = ?2)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("count query returned no row".into()))?;
        let undelivered = row.int(0)?;
        let pending = row.int(1)?;
        if undelivered != pending {
            violations.push(district_violation(
                w,
                d,
                format!("orders with NULL carrier={undelivered} new_order rows={pending}"),
            ));
        }
    }
    Ok(violations)
}

/// 5: `c_balance = sum(delivered ol_amount) - sum(h_amount)` per customer.
fn check_customer_balances(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let mismatched = conn
            .query_one(
                "SELECT COUNT(*) FROM customer c \
                 WHERE c.c_w_id = ?1 AND c.c_d_id = ?2 AND c.c_balance <> \
                   IFNULL((SELECT SUM(ol.ol_amount) FROM order_line ol \
                           JOIN orders o ON o.o_w_id = ol.ol_w_id \
                             AND o.o_d_id = ol.ol_d_id AND o.o_id = ol.ol_o_id \
                           WHERE ol.ol_w_id = c.c_w_id AND ol.ol_d_id = c.c_d_id \
                             AND o.o_c_id = c.c_id \
                             AND ol.ol_delivery_d IS NOT NULL), 0) \
                   - IFNULL((SELECT SUM(h.h_amount) FROM history h \
                             WHERE h.h_c_w_id = c.c_w_id AND h.h_c_d_id = c.c_d_id \
                               AND h.h_c_id = c.c_id), 0)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("customer aggregate returned no row".into()))?
            .int(0)?;
        if mismatched != 0 {
            violations.push(district_violation(
                w,
                d,
                format!("{mismatched} customers with unreconciled balances"),
            ));
        }
    }
    Ok(violations)
}

/// 6: `w_ytd = sum(d_ytd)` per warehouse.
fn check_warehouse_district_ytd(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for w in checker.warehouse_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT w_ytd FROM warehouse WHERE w_id = ?1), \
                   (SELECT IFNULL(SUM(d_ytd), 0) FROM district WHERE d_w_id = ?1)",
                &params(&[w]),
            )?
            .ok_or_else(|| DbError::Failed("ytd query returned no row".into()))?;
        let w_ytd = row.opt_int(0)?.unwrap_or(0);
        let district_sum = row.int(1)?;
        if w_ytd != district_sum {
            violations.push(CheckViolation {
                warehouse: w,
                district: None,
                detail: format!("w_ytd={w_ytd} sum(d_ytd)={district_sum}"),
            });
        }
    }
    Ok(violations)
}

/// 7: `w_ytd = sum(h_amount)` over payments made at the warehouse.
fn check_warehouse_history(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for w in checker.warehouse_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT w_ytd FROM warehouse WHERE w_id = ?1), \
                   (SELECT IFNULL(SUM(h_amount), 0) FROM history WHERE h_w_id = ?1)",
                &params(&[w]),
            )?
            .ok_or_else(|| DbError::Failed("ytd query returned no row".into()))?;
        let w_ytd = row.opt_int(0)?.unwrap_or(0);
        let history_sum = row.int(1)?;
        if w_ytd != history_sum {
            violations.push(CheckViolation {
                warehouse: w,
                district: None,
                detail: format!("w_ytd={w_ytd} sum(h_amount)={history_sum}"),
            });
        }
    }
    Ok(violations)
}

/// 8: `d_ytd = sum(h_amount)` over payments made at the district.
fn check_district_history(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT d_ytd FROM district WHERE d_w_id = ?1 AND d_id = ?2), \
                   (SELECT IFNULL(SUM(h_amount), 0) FROM history \
                    WHERE h_w_id = ?1 AND h_d_id = ?2)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("ytd query returned no row".into()))?;
        let d_ytd = row.opt_int(0)?.unwrap_or(0);
        let history_sum = row.int(1)?;
        if d_ytd != history_sum {
            violations.push(district_violation(
                w,
                d,
                format!("d_ytd={d_ytd} sum(h_amount)={history_sum}"),
            ));
        }
    }
    Ok(violations)
}

/// 9: `sum(o_ol_cnt) = count(order_line)` per district.
fn check_district_line_totals(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT IFNULL(SUM(o_ol_cnt), 0) FROM orders \
                    WHERE o_w_id = ?1 AND o_d_id = ?2), \
                   (SELECT COUNT(*) FROM order_line \
                    WHERE ol_w_id = ?1 AND ol_d_id = ?2)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("count query returned no row".into()))?;
        let declared = row.int(0)?;
        let actual = row.int(1)?;
        if declared != actual {
            violations.push(district_violation(
                w,
                d,
                format!("sum(o_ol_cnt)={declared} count(order_line)={actual}"),
            ));
        }
    }
    Ok(violations)
}

/// 10: `sum(c_payment_cnt) = count(history rows)` per district of customers.
fn check_payment_counts(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT IFNULL(SUM(c_payment_cnt), 0) FROM customer \
                    WHERE c_w_id = ?1 AND c_d_id = ?2), \
                   (SELECT COUNT(*) FROM history \
                    WHERE h_c_w_id = ?1 AND h_c_d_id = ?2)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("count query returned no row".into()))?;
        let payments = row.int(0)?;
        let history_rows = row.int(1)?;
        if payments != history_rows {
            violations.push(district_violation(
                w,
                d,
                format!("sum(c_payment_cnt)={payments} history rows={history_rows}"),
            ));
        }
    }
    Ok(violations)
}

/// 11: `count(orders) - count(new_order) = 2100 + sum(c_delivery_cnt)` per
/// district: the initial load delivers 2100 orders per district without
/// crediting any customer, and each Delivery moves both sides by one.
fn check_delivery_counts(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for (w, d) in checker.district_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT COUNT(*) FROM orders WHERE o_w_id = ?1 AND o_d_id = ?2), \
                   (SELECT COUNT(*) FROM new_order WHERE no_w_id = ?1 AND no_d_id = ?2), \
                   (SELECT IFNULL(SUM(c_delivery_cnt), 0) FROM customer \
                    WHERE c_w_id = ?1 AND c_d_id = ?2)",
                &params(&[w, d]),
            )?
            .ok_or_else(|| DbError::Failed("count query returned no row".into()))?;
        let orders = row.int(0)?;
        let pending = row.int(1)?;
        let deliveries = row.int(2)?;
        if orders - pending != 2100 + deliveries {
            violations.push(district_violation(
                w,
                d,
                format!(
                    "orders={orders} new_order={pending} sum(c_delivery_cnt)={deliveries}"
                ),
            ));
        }
    }
    Ok(violations)
}

/// 12: `sum(s_remote_cnt) = count(remote-supplied order lines)` per
/// warehouse.
fn check_remote_counts(
    checker: &ConsistencyChecker,
    conn: &mut dyn Connection,
) -> Result<Vec<CheckViolation>, DbError> {
    let mut violations = Vec::new();
    for w in checker.warehouse_ids() {
        let row = conn
            .query_one(
                "SELECT \
                   (SELECT IFNULL(SUM(s_remote_cnt), 0) FROM stock WHERE s_w_id = ?1), \
                   (SELECT COUNT(*) FROM order_line \
                    WHERE ol_supply_w_id = ?1 AND ol_w_id <> ?1)",
                &params(&[w]),
            )?
            .ok_or_else(|| DbError::Failed("count query returned no row".into()))?;
        let counted = row.int(0)?;
        let actual = row.int(1)?;
        if counted != actual {
            violations.push(CheckViolation {
                warehouse: w,
                district: None,
                detail: format!("sum(s_remote_cnt)={counted} remote lines={actual}"),
            });
        }
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_checks_registered() {
        assert_eq!(CHECKS.len(), 12);
        let ids: Vec<u8> = CHECKS.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_result_passed() {
        let ok = CheckResult {
            id: 1,
            name: "x",
            violations: vec![],
        };
        assert!(ok.passed());
        let bad = CheckResult {
            id: 1,
            name: "x",
            violations: vec![CheckViolation {
                warehouse: 1,
                district: Some(2),
                detail: "off by one".into(),
            }],
        };
        assert!(!bad.passed());
    }
}
