//! End-to-end tests: load a real population into SQLite, drive the
//! transaction profiles, and verify the consistency invariants.

use std::time::Duration;

use tempfile::TempDir;

use tpcc_bench::db::{Connection, RowExt, Value};
use tpcc_bench::engine::profiles::{
    self, CustomerSelector, DeliveryInput, NewOrderInput, OrderLineRequest, OrderStatusInput,
    PaymentInput, StockLevelInput, TxnInput, INVALID_ITEM_ID,
};
use tpcc_bench::engine::Outcome;
use tpcc_bench::{
    ConsistencyChecker, Database, DataGenerator, EngineConfig, SchemaLoader, SqliteDatabase,
    TransactionEngine, TxnKind,
};

fn scratch_db() -> (TempDir, SqliteDatabase) {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteDatabase::new(dir.path().join("bench.db"));
    db.create_schema().unwrap();
    (dir, db)
}

fn exec(conn: &mut impl Connection, sql: &str, params: &[Value]) {
    conn.execute(sql, params).unwrap();
}

fn int_one(conn: &mut impl Connection, sql: &str, params: &[Value]) -> i64 {
    conn.query_one(sql, params).unwrap().unwrap().int(0).unwrap()
}

/// Hand-built single-warehouse world for driving individual profiles.
///
/// District 1 has three undelivered orders {5, 7, 9} with one line each,
/// customers 1 (good credit), 2 (bad credit) and 10/11/12 sharing a last
/// name, and stock for items 1 and 2.
fn mini_world(conn: &mut impl Connection) {
    exec(
        conn,
        "INSERT INTO warehouse VALUES (1, 'W01', '', '', '', 'CA', '123411111', 100, 0)",
        &[],
    );
    exec(
        conn,
        "INSERT INTO district VALUES (1, 1, 'D01', '', '', '', 'CA', '123411111', 200, 0, 10)",
        &[],
    );

    let customer = |id: i64, first: &str, last: &str, credit: &str, data: &str| -> Vec<Value> {
        vec![
            id.into(),
            1.into(),
            1.into(),
            first.into(),
            "OE".into(),
            last.into(),
            "".into(),
            "".into(),
            "".into(),
            "CA".into(),
            "123411111".into(),
            "0123456789012345".into(),
            0.into(),
            credit.into(),
            5_000_000.into(),
            0.into(),
            0.into(),
            0.into(),
            0.into(),
            0.into(),
            data.into(),
        ]
    };
    let insert_customer = "INSERT INTO customer VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)";
    exec(conn, insert_customer, &customer(1, "ANNE", "ESEPRIBAR", "GC", "untouched"));
    exec(conn, insert_customer, &customer(2, "BOB", "ESEPRIOUGHT", "BC", "old-data"));
    exec(conn, insert_customer, &customer(10, "AAA", "BARBARBAR", "GC", ""));
    exec(conn, insert_customer, &customer(11, "BBB", "BARBARBAR", "GC", ""));
    exec(conn, insert_customer, &customer(12, "CCC", "BARBARBAR", "GC", ""));

    exec(conn, "INSERT INTO item VALUES (1, 1, 'thing one', 500, 'plain')", &[]);
    exec(conn, "INSERT INTO item VALUES (2, 2, 'thing two', 300, 'plain')", &[]);

    let dists: Vec<Value> = (0..10).map(|i| Value::Text(format!("DIST{i:020}"))).collect();
    let mut stock1: Vec<Value> = vec![1.into(), 1.into(), 12.into()];
    stock1.extend(dists.iter().cloned());
    stock1.extend([0.into(), 0.into(), 0.into(), Value::Text("plain".into())]);
    exec(
        conn,
        "INSERT INTO stock VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        &stock1,
    );
    let mut stock2: Vec<Value> = vec![2.into(), 1.into(), 50.into()];
    stock2.extend(dists.iter().cloned());
    stock2.extend([0.into(), 0.into(), 0.into(), Value::Text("plain".into())]);
    exec(
        conn,
        "INSERT INTO stock VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        &stock2,
    );

    for (o_id, amount) in [(5i64, 700i64), (7, 1100), (9, 1300)] {
        exec(
            conn,
            "INSERT INTO orders VALUES (?1, 1, 1, 1, 0, NULL, 1, 1)",
            &[o_id.into()],
        );
        exec(
            conn,
            "INSERT INTO order_line VALUES (?1, 1, 1, 1, 2, 1, NULL, 1, ?2, 'x')",
            &[o_id.into(), amount.into()],
        );
        exec(
            conn,
            "INSERT INTO new_order VALUES (?1, 1, 1)",
            &[o_id.into()],
        );
    }
}

#[test]
fn test_delivery_is_fifo_per_district() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let input = TxnInput::Delivery(DeliveryInput { w_id: 1, carrier_id: 4 });
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);

    // Exactly the oldest pending order (5) is delivered; {7, 9} remain.
    let pending = conn
        .query("SELECT no_o_id FROM new_order ORDER BY no_o_id", &[])
        .unwrap();
    assert_eq!(pending, vec![vec![Value::Int(7)], vec![Value::Int(9)]]);
    assert_eq!(
        int_one(&mut conn, "SELECT o_carrier_id FROM orders WHERE o_id = 5", &[]),
        4
    );
    assert!(conn
        .query_one("SELECT ol_delivery_d FROM order_line WHERE ol_o_id = 5", &[])
        .unwrap()
        .unwrap()
        .opt_int(0)
        .unwrap()
        .is_some());
    // The order's line total is credited to the customer.
    assert_eq!(
        int_one(&mut conn, "SELECT c_balance FROM customer WHERE c_id = 1", &[]),
        700
    );
    assert_eq!(
        int_one(&mut conn, "SELECT c_delivery_cnt FROM customer WHERE c_id = 1", &[]),
        1
    );

    // The next delivery takes order 7, never 9.
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);
    let pending = conn
        .query("SELECT no_o_id FROM new_order ORDER BY no_o_id", &[])
        .unwrap();
    assert_eq!(pending, vec![vec![Value::Int(9)]]);
}

#[test]
fn test_new_order_wraps_stock_quantity() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let input = TxnInput::NewOrder(NewOrderInput {
        w_id: 1,
        d_id: 1,
        c_id: 1,
        lines: vec![OrderLineRequest {
            i_id: 1,
            supply_w_id: 1,
            quantity: 15,
        }],
    });
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);

    // 12 - 15 + 91 = 88, one more order counted, 15 units sold.
    let row = conn
        .query_one(
            "SELECT s_quantity, s_order_cnt, s_ytd, s_remote_cnt FROM stock WHERE s_i_id = 1",
            &[],
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.int(0).unwrap(), 88);
    assert_eq!(row.int(1).unwrap(), 1);
    assert_eq!(row.int(2).unwrap(), 15);
    assert_eq!(row.int(3).unwrap(), 0);

    // The district counter moved once and the order landed undelivered.
    assert_eq!(
        int_one(&mut conn, "SELECT d_next_o_id FROM district WHERE d_id = 1", &[]),
        11
    );
    assert!(conn
        .query_one("SELECT o_carrier_id FROM orders WHERE o_id = 10", &[])
        .unwrap()
        .unwrap()
        .opt_int(0)
        .unwrap()
        .is_none());
    assert_eq!(
        int_one(&mut conn, "SELECT COUNT(*) FROM new_order WHERE no_o_id = 10", &[]),
        1
    );
    assert_eq!(
        int_one(&mut conn, "SELECT ol_amount FROM order_line WHERE ol_o_id = 10", &[]),
        15 * 500
    );
}

#[test]
fn test_new_order_invalid_item_rolls_back() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let input = TxnInput::NewOrder(NewOrderInput {
        w_id: 1,
        d_id: 1,
        c_id: 1,
        lines: vec![
            OrderLineRequest {
                i_id: 2,
                supply_w_id: 1,
                quantity: 3,
            },
            OrderLineRequest {
                i_id: INVALID_ITEM_ID,
                supply_w_id: 1,
                quantity: 1,
            },
        ],
    });
    // A valid "not found" outcome, not an error.
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::RolledBack);

    // Nothing stuck: counter, orders, lines and stock all untouched.
    assert_eq!(
        int_one(&mut conn, "SELECT d_next_o_id FROM district WHERE d_id = 1", &[]),
        10
    );
    assert_eq!(int_one(&mut conn, "SELECT COUNT(*) FROM orders", &[]), 3);
    assert_eq!(int_one(&mut conn, "SELECT COUNT(*) FROM new_order", &[]), 3);
    assert_eq!(
        int_one(&mut conn, "SELECT s_quantity FROM stock WHERE s_i_id = 2", &[]),
        50
    );
}

#[test]
fn test_payment_bad_credit_note() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let input = TxnInput::Payment(PaymentInput {
        w_id: 1,
        d_id: 1,
        c_w_id: 1,
        c_d_id: 1,
        selector: CustomerSelector::ById(2),
        amount: 5000,
    });
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);

    // Bad credit: the note is prepended to c_data and bounded.
    let row = conn
        .query_one(
            "SELECT c_balance, c_ytd_payment, c_payment_cnt, c_data FROM customer WHERE c_id = 2",
            &[],
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.int(0).unwrap(), -5000);
    assert_eq!(row.int(1).unwrap(), 5000);
    assert_eq!(row.int(2).unwrap(), 1);
    let data = row.text(3).unwrap();
    assert!(data.starts_with("2 1 1 1 1 50.00"), "c_data = {data}");
    assert!(data.contains("old-data"));
    assert!(data.len() <= 500);

    // Warehouse and district year-to-date move with the payment, and the
    // payment is recorded in history.
    assert_eq!(int_one(&mut conn, "SELECT w_ytd FROM warehouse", &[]), 5000);
    assert_eq!(
        int_one(&mut conn, "SELECT d_ytd FROM district WHERE d_id = 1", &[]),
        5000
    );
    assert_eq!(
        int_one(&mut conn, "SELECT COUNT(*) FROM history WHERE h_c_id = 2 AND h_amount = 5000", &[]),
        1
    );

    // A good-credit customer's data field stays untouched.
    let input = TxnInput::Payment(PaymentInput {
        w_id: 1,
        d_id: 1,
        c_w_id: 1,
        c_d_id: 1,
        selector: CustomerSelector::ById(1),
        amount: 700,
    });
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);
    let row = conn
        .query_one("SELECT c_balance, c_data FROM customer WHERE c_id = 1", &[])
        .unwrap()
        .unwrap();
    assert_eq!(row.int(0).unwrap(), -700);
    assert_eq!(row.text(1).unwrap(), "untouched");
}

#[test]
fn test_payment_by_last_name_picks_middle_match() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let input = TxnInput::Payment(PaymentInput {
        w_id: 1,
        d_id: 1,
        c_w_id: 1,
        c_d_id: 1,
        selector: CustomerSelector::ByLastName("BARBARBAR".into()),
        amount: 900,
    });
    assert_eq!(profiles::execute(&mut conn, &input).unwrap(), Outcome::Committed);

    // Of AAA(10), BBB(11), CCC(12) the middle row by first name wins.
    assert_eq!(
        int_one(&mut conn, "SELECT c_balance FROM customer WHERE c_id = 11", &[]),
        -900
    );
    for other in [10i64, 12] {
        assert_eq!(
            int_one(
                &mut conn,
                "SELECT c_balance FROM customer WHERE c_id = ?1",
                &[other.into()],
            ),
            0
        );
    }
}

#[test]
fn test_read_only_profiles_leave_state_alone() {
    let (_dir, db) = scratch_db();
    let mut conn = db.connect().unwrap();
    mini_world(&mut conn);

    let status = TxnInput::OrderStatus(OrderStatusInput {
        w_id: 1,
        d_id: 1,
        selector: CustomerSelector::ById(1),
    });
    assert_eq!(profiles::execute(&mut conn, &status).unwrap(), Outcome::Committed);

    let level = TxnInput::StockLevel(StockLevelInput {
        w_id: 1,
        d_id: 1,
        threshold: 15,
    });
    assert_eq!(profiles::execute(&mut conn, &level).unwrap(), Outcome::Committed);

    assert_eq!(int_one(&mut conn, "SELECT COUNT(*) FROM orders", &[]), 3);
    assert_eq!(int_one(&mut conn, "SELECT COUNT(*) FROM history", &[]), 0);
    assert_eq!(
        int_one(&mut conn, "SELECT c_balance FROM customer WHERE c_id = 1", &[]),
        0
    );
}

#[test]
fn test_full_run_preserves_all_invariants() {
    let (_dir, db) = scratch_db();
    let gen = DataGenerator::new(1, 42).unwrap();
    let mut conn = db.connect().unwrap();
    let summary = SchemaLoader::new(&mut conn).load_all(&gen).unwrap();
    assert!(summary.total_rows() > 500_000);

    // The freshly loaded population already satisfies every invariant.
    let checker = ConsistencyChecker::new(1);
    for result in checker.run_all(&mut conn) {
        assert!(result.passed(), "fresh load: check {} failed", result.id);
    }

    let initial_counter_sum = int_one(&mut conn, "SELECT SUM(d_next_o_id) FROM district", &[]);

    let config = EngineConfig {
        warehouses: 1,
        workers: 4,
        seed: 42,
        transactions: Some(300),
        duration: None,
        max_retries: 10,
    };
    let stats = TransactionEngine::new(&db, config).unwrap().run().unwrap();
    assert_eq!(stats.total_attempted(), 300);
    let per_outcome: u64 = TxnKind::ALL
        .iter()
        .map(|&k| {
            let s = stats.kind(k);
            s.committed + s.rolled_back + s.aborted
        })
        .sum();
    assert_eq!(per_outcome, 300);
    assert!(stats.total_committed() > 0);
    assert!(stats.wall > Duration::ZERO);

    // Every committed New-Order advanced exactly one district counter.
    let counter_sum = int_one(&mut conn, "SELECT SUM(d_next_o_id) FROM district", &[]);
    assert_eq!(
        (counter_sum - initial_counter_sum) as u64,
        stats.kind(TxnKind::NewOrder).committed
    );
    // No two committed orders share an id: ids are dense per district.
    let duplicate_ids = int_one(
        &mut conn,
        "SELECT COUNT(*) FROM (SELECT o_d_id, o_id FROM orders \
         GROUP BY o_d_id, o_id HAVING COUNT(*) > 1)",
        &[],
    );
    assert_eq!(duplicate_ids, 0);

    // All twelve checks hold after the concurrent run.
    for result in checker.run_all(&mut conn) {
        assert!(
            result.passed(),
            "after run: check {} ({}) failed: {:?}",
            result.id,
            result.name,
            result.violations
        );
    }

    // Removing one order must be caught by check 1, and the remaining
    // checks still run (exhaustive reporting).
    exec(
        &mut conn,
        "DELETE FROM orders WHERE o_w_id = 1 AND o_d_id = 1 AND o_id = 1",
        &[],
    );
    let results = checker.run_all(&mut conn);
    assert_eq!(results.len(), 12);
    let first = &results[0];
    assert_eq!(first.id, 1);
    assert!(!first.passed());
    assert!(first
        .violations
        .iter()
        .any(|v| v.warehouse == 1 && v.district == Some(1)));
}

#[test]
fn test_csv_export_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a");
    let second = dir.path().join("b");
    let third = dir.path().join("c");

    let gen = DataGenerator::new(1, 42).unwrap();
    tpcc_bench::loader::export_csv(&gen, &first).unwrap();
    let again = DataGenerator::new(1, 42).unwrap();
    tpcc_bench::loader::export_csv(&again, &second).unwrap();
    let reseeded = DataGenerator::new(1, 43).unwrap();
    tpcc_bench::loader::export_csv(&reseeded, &third).unwrap();

    for table in ["warehouse.csv", "district.csv", "new_order.csv"] {
        let a = std::fs::read(first.join(table)).unwrap();
        let b = std::fs::read(second.join(table)).unwrap();
        assert_eq!(a, b, "{table} differs between identical runs");
    }
    let a = std::fs::read(first.join("district.csv")).unwrap();
    let c = std::fs::read(third.join("district.csv")).unwrap();
    assert_ne!(a, c, "district.csv identical across different seeds");

    // 900 open orders per district, ten districts.
    let new_orders = std::fs::read_to_string(first.join("new_order.csv")).unwrap();
    assert_eq!(new_orders.lines().count(), 9000);
}
