//! Scale-correct synthetic data generation.
//!
//! Given a warehouse count W and a seed, produces the full initial row set
//! for all nine tables as lazy iterators: Customer, Stock and OrderLine grow
//! as O(W) and can reach tens of millions of rows, so nothing is ever
//! materialized whole. Per-order attributes are drawn from a stream derived
//! from (seed, warehouse, district, order), which lets the `orders` and
//! `order_lines` iterators agree on line counts without sharing state.
//!
//! Generation is fully deterministic: the same (W, seed) yields
//! byte-identical rows, and no wall clock is consulted.

use crate::model::{
    Customer, District, History, Item, NewOrder, Order, OrderLine, Stock, Warehouse,
};
use crate::rng::TpccRng;
use crate::BenchError;

pub const DISTRICTS_PER_WAREHOUSE: i64 = 10;
pub const CUSTOMERS_PER_DISTRICT: i64 = 3000;
pub const ITEM_COUNT: i64 = 100_000;
pub const ORDERS_PER_DISTRICT: i64 = 3000;
/// Orders with this id and above are generated undelivered (900 per district).
pub const FIRST_OPEN_ORDER: i64 = 2101;

/// Fixed reference instant for generated timestamps, so that generation
/// never consults the wall clock.
pub const LOAD_EPOCH: i64 = 1_700_000_000;

const TWO_YEARS_SECS: i64 = 730 * 24 * 60 * 60;

// Stream tags; one namespace per table keeps the per-table iterators
// independent of each other's draw order.
const TAG_WAREHOUSE: u64 = 0x5741_5245;
const TAG_DISTRICT: u64 = 0x4449_5354;
const TAG_CUSTOMER: u64 = 0x4355_5354;
const TAG_ITEM: u64 = 0x4954_454d;
const TAG_STOCK: u64 = 0x5354_434b;
const TAG_ORDER: u64 = 0x4f52_4452;
const TAG_HISTORY: u64 = 0x4849_5354;

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn stream(seed: u64, tag: u64, a: i64, b: i64) -> TpccRng {
    let key = splitmix(seed ^ splitmix(tag) ^ ((a as u64) << 24) ^ b as u64);
    TpccRng::new(key)
}

/// Per-order draws shared by the `orders` and `order_lines` iterators.
struct OrderHeader {
    ol_cnt: i64,
    c_id: i64,
    entry_d: i64,
    carrier_id: i64,
    rng: TpccRng,
}

/// Generates the initial database population for a given scale factor.
pub struct DataGenerator {
    warehouses: i64,
    seed: u64,
}

impl DataGenerator {
    /// Creates a generator for `warehouses` warehouses (W >= 1).
    pub fn new(warehouses: i64, seed: u64) -> Result<Self, BenchError> {
        if warehouses < 1 {
            return Err(BenchError::Generation(format!(
                "scale factor must be at least 1, got {warehouses}"
            )));
        }
        Ok(Self { warehouses, seed })
    }

    pub fn warehouse_count(&self) -> i64 {
        self.warehouses
    }

    fn district_ids(&self) -> impl Iterator<Item = (i64, i64)> {
        let warehouses = self.warehouses;
        (1..=warehouses).flat_map(|w| (1..=DISTRICTS_PER_WAREHOUSE).map(move |d| (w, d)))
    }

    fn order_header(&self, w: i64, d: i64, o: i64) -> OrderHeader {
        let mut rng = stream(self.seed, TAG_ORDER, w * 100 + d, o);
        let ol_cnt = rng.uniform(5, 15);
        let c_id = rng.uniform(1, CUSTOMERS_PER_DISTRICT);
        let entry_d = LOAD_EPOCH - rng.uniform(0, TWO_YEARS_SECS);
        let carrier_id = rng.uniform(1, 10);
        OrderHeader {
            ol_cnt,
            c_id,
            entry_d,
            carrier_id,
            rng,
        }
    }

    pub fn warehouses(&self) -> impl Iterator<Item = Warehouse> + '_ {
        let seed = self.seed;
        (1..=self.warehouses).map(move |w_id| {
            let mut rng = stream(seed, TAG_WAREHOUSE, w_id, 0);
            Warehouse {
                w_id,
                w_name: format!("W{w_id:02}"),
                w_street_1: rng.alphanumeric(10, 20),
                w_street_2: rng.alphanumeric(10, 20),
                w_city: rng.alphanumeric(10, 20),
                w_state: state_code(&mut rng),
                w_zip: zip_code(&mut rng),
                w_tax: rng.uniform(0, 2000),
                w_ytd: 30_000_000,
            }
        })
    }

    pub fn districts(&self) -> impl Iterator<Item = District> + '_ {
        let seed = self.seed;
        self.district_ids().map(move |(w_id, d_id)| {
            let mut rng = stream(seed, TAG_DISTRICT, w_id, d_id);
            District {
                d_id,
                d_w_id: w_id,
                d_name: format!("D{d_id:02}"),
                d_street_1: rng.alphanumeric(10, 20),
                d_street_2: rng.alphanumeric(10, 20),
                d_city: rng.alphanumeric(10, 20),
                d_state: state_code(&mut rng),
                d_zip: zip_code(&mut rng),
                d_tax: rng.uniform(0, 2000),
                d_ytd: 3_000_000,
                d_next_o_id: ORDERS_PER_DISTRICT + 1,
            }
        })
    }

    pub fn customers(&self) -> impl Iterator<Item = Customer> + '_ {
        let seed = self.seed;
        self.district_ids().flat_map(move |(w_id, d_id)| {
            let mut rng = stream(seed, TAG_CUSTOMER, w_id, d_id);
            (1..=CUSTOMERS_PER_DISTRICT).map(move |c_id| {
                // The first 1000 customers cover every last-name index, so
                // lookup by a NURand-selected name always matches.
                let c_last = if c_id <= 1000 {
                    TpccRng::last_name(c_id - 1)
                } else {
                    TpccRng::last_name(rng.last_name_index())
                };
                let c_credit = if rng.uniform(1, 100) <= 10 { "BC" } else { "GC" };
                Customer {
                    c_id,
                    c_d_id: d_id,
                    c_w_id: w_id,
                    c_first: rng.alphanumeric(8, 16),
                    c_middle: "OE".into(),
                    c_last,
                    c_street_1: rng.alphanumeric(10, 20),
                    c_street_2: rng.alphanumeric(10, 20),
                    c_city: rng.alphanumeric(10, 20),
                    c_state: state_code(&mut rng),
                    c_zip: zip_code(&mut rng),
                    c_phone: rng.numeric_string(16),
                    c_since: LOAD_EPOCH - rng.uniform(0, TWO_YEARS_SECS),
                    c_credit: c_credit.into(),
                    c_credit_lim: 5_000_000,
                    c_discount: rng.uniform(0, 5000),
                    c_balance: -1000,
                    c_ytd_payment: 1000,
                    c_payment_cnt: 1,
                    c_delivery_cnt: 0,
                    c_data: rng.alphanumeric(300, 500),
                }
            })
        })
    }

    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        let mut rng = stream(self.seed, TAG_ITEM, 0, 0);
        (1..=ITEM_COUNT).map(move |i_id| Item {
            i_id,
            i_im_id: rng.uniform(1, 10_000),
            i_name: rng.alphanumeric(14, 24),
            i_price: rng.uniform(100, 10_000),
            i_data: original_data(&mut rng),
        })
    }

    pub fn stock(&self) -> impl Iterator<Item = Stock> + '_ {
        let seed = self.seed;
        (1..=self.warehouses).flat_map(move |w_id| {
            let mut rng = stream(seed, TAG_STOCK, w_id, 0);
            (1..=ITEM_COUNT).map(move |i_id| Stock {
                s_i_id: i_id,
                s_w_id: w_id,
                s_quantity: rng.uniform(10, 100),
                s_dist: std::array::from_fn(|_| rng.alphanumeric(24, 24)),
                s_ytd: 0,
                s_order_cnt: 0,
                s_remote_cnt: 0,
                s_data: original_data(&mut rng),
            })
        })
    }

    pub fn orders(&self) -> impl Iterator<Item = Order> + '_ {
        self.district_ids().flat_map(move |(w_id, d_id)| {
            (1..=ORDERS_PER_DISTRICT).map(move |o_id| {
                let header = self.order_header(w_id, d_id, o_id);
                Order {
                    o_id,
                    o_d_id: d_id,
                    o_w_id: w_id,
                    o_c_id: header.c_id,
                    o_entry_d: header.entry_d,
                    o_carrier_id: (o_id < FIRST_OPEN_ORDER).then_some(header.carrier_id),
                    o_ol_cnt: header.ol_cnt,
                    o_all_local: 1,
                }
            })
        })
    }

    pub fn new_orders(&self) -> impl Iterator<Item = NewOrder> + '_ {
        self.district_ids().flat_map(|(w_id, d_id)| {
            (FIRST_OPEN_ORDER..=ORDERS_PER_DISTRICT).map(move |o_id| NewOrder {
                no_o_id: o_id,
                no_d_id: d_id,
                no_w_id: w_id,
            })
        })
    }

    pub fn order_lines(&self) -> impl Iterator<Item = OrderLine> + '_ {
        self.district_ids().flat_map(move |(w_id, d_id)| {
            (1..=ORDERS_PER_DISTRICT).flat_map(move |o_id| {
                let mut header = self.order_header(w_id, d_id, o_id);
                let delivered = o_id < FIRST_OPEN_ORDER;
                let delivery_d = header.entry_d + 86_400;
                (1..=header.ol_cnt).map(move |ol_number| OrderLine {
                    ol_o_id: o_id,
                    ol_d_id: d_id,
                    ol_w_id: w_id,
                    ol_number,
                    ol_i_id: header.rng.uniform(1, ITEM_COUNT),
                    // The population is entirely home-supplied; remote
                    // supply (1%) is injected by New-Order at run time.
                    ol_supply_w_id: w_id,
                    ol_delivery_d: delivered.then_some(delivery_d),
                    // Delivered lines carry a zero amount so customer
                    // balances reconcile on the freshly loaded database.
                    ol_amount: if delivered {
                        0
                    } else {
                        header.rng.uniform(1, 999_999)
                    },
                    ol_quantity: header.rng.uniform(1, 10),
                    ol_dist_info: header.rng.alphanumeric(24, 24),
                })
            })
        })
    }

    pub fn history(&self) -> impl Iterator<Item = History> + '_ {
        let seed = self.seed;
        self.district_ids().flat_map(move |(w_id, d_id)| {
            let mut rng = stream(seed, TAG_HISTORY, w_id, d_id);
            (1..=CUSTOMERS_PER_DISTRICT).map(move |c_id| History {
                h_c_id: c_id,
                h_c_d_id: d_id,
                h_c_w_id: w_id,
                h_d_id: d_id,
                h_w_id: w_id,
                h_date: LOAD_EPOCH - rng.uniform(0, TWO_YEARS_SECS),
                h_amount: 1000,
                h_data: rng.alphanumeric(12, 24),
            })
        })
    }
}

fn state_code(rng: &mut TpccRng) -> String {
    (0..2)
        .map(|_| char::from(b'A' + rng.uniform(0, 25) as u8))
        .collect()
}

fn zip_code(rng: &mut TpccRng) -> String {
    let mut zip = rng.numeric_string(4);
    zip.push_str("11111");
    zip
}

/// Data string with `"ORIGINAL"` spliced in at a random position for 10% of
/// item and stock rows.
fn original_data(rng: &mut TpccRng) -> String {
    let mut data = rng.alphanumeric(26, 50);
    if rng.uniform(1, 100) <= 10 {
        let pos = rng.uniform(0, data.len() as i64 - 8) as usize;
        data.replace_range(pos..pos + 8, "ORIGINAL");
    }
    data
}
