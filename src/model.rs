//! Row types for the nine TPC-C tables.
//!
//! Monetary columns are integer cents and tax/discount rates are basis
//! points, so the consistency checks compare exactly instead of chasing
//! float drift. Timestamps are unix seconds. Each row type knows how to
//! render itself as one headerless CSV line in schema column order, the
//! bulk-load exchange format.

/// Formats integer cents as a decimal dollar amount, e.g. `1050` -> `10.50`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn opt(v: Option<i64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warehouse {
    pub w_id: i64,
    pub w_name: String,
    pub w_street_1: String,
    pub w_street_2: String,
    pub w_city: String,
    pub w_state: String,
    pub w_zip: String,
    /// Tax rate in basis points.
    pub w_tax: i64,
    /// Year-to-date revenue in cents.
    pub w_ytd: i64,
}

impl Warehouse {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.w_id,
            self.w_name,
            self.w_street_1,
            self.w_street_2,
            self.w_city,
            self.w_state,
            self.w_zip,
            self.w_tax,
            self.w_ytd
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub d_id: i64,
    pub d_w_id: i64,
    pub d_name: String,
    pub d_street_1: String,
    pub d_street_2: String,
    pub d_city: String,
    pub d_state: String,
    pub d_zip: String,
    pub d_tax: i64,
    pub d_ytd: i64,
    /// Next order id to assign; monotonically increased by New-Order.
    pub d_next_o_id: i64,
}

impl District {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.d_id,
            self.d_w_id,
            self.d_name,
            self.d_street_1,
            self.d_street_2,
            self.d_city,
            self.d_state,
            self.d_zip,
            self.d_tax,
            self.d_ytd,
            self.d_next_o_id
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub c_id: i64,
    pub c_d_id: i64,
    pub c_w_id: i64,
    pub c_first: String,
    pub c_middle: String,
    pub c_last: String,
    pub c_street_1: String,
    pub c_street_2: String,
    pub c_city: String,
    pub c_state: String,
    pub c_zip: String,
    pub c_phone: String,
    pub c_since: i64,
    /// `"GC"` (good) or `"BC"` (bad); 10% of customers are bad credit.
    pub c_credit: String,
    pub c_credit_lim: i64,
    /// Discount in basis points.
    pub c_discount: i64,
    pub c_balance: i64,
    pub c_ytd_payment: i64,
    pub c_payment_cnt: i64,
    pub c_delivery_cnt: i64,
    pub c_data: String,
}

impl Customer {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.c_id,
            self.c_d_id,
            self.c_w_id,
            self.c_first,
            self.c_middle,
            self.c_last,
            self.c_street_1,
            self.c_street_2,
            self.c_city,
            self.c_state,
            self.c_zip,
            self.c_phone,
            self.c_since,
            self.c_credit,
            self.c_credit_lim,
            self.c_discount,
            self.c_balance,
            self.c_ytd_payment,
            self.c_payment_cnt,
            self.c_delivery_cnt,
            self.c_data
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub i_id: i64,
    pub i_im_id: i64,
    pub i_name: String,
    /// Price in cents.
    pub i_price: i64,
    pub i_data: String,
}

impl Item {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.i_id, self.i_im_id, self.i_name, self.i_price, self.i_data
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub s_i_id: i64,
    pub s_w_id: i64,
    pub s_quantity: i64,
    pub s_dist: [String; 10],
    /// Total quantity sold.
    pub s_ytd: i64,
    pub s_order_cnt: i64,
    pub s_remote_cnt: i64,
    pub s_data: String,
}

impl Stock {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.s_i_id,
            self.s_w_id,
            self.s_quantity,
            self.s_dist.join(","),
            self.s_ytd,
            self.s_order_cnt,
            self.s_remote_cnt,
            self.s_data
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub o_id: i64,
    pub o_d_id: i64,
    pub o_w_id: i64,
    pub o_c_id: i64,
    pub o_entry_d: i64,
    /// NULL until the order is delivered.
    pub o_carrier_id: Option<i64>,
    pub o_ol_cnt: i64,
    pub o_all_local: i64,
}

impl Order {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.o_id,
            self.o_d_id,
            self.o_w_id,
            self.o_c_id,
            self.o_entry_d,
            opt(self.o_carrier_id),
            self.o_ol_cnt,
            self.o_all_local
        )
    }
}

/// Marker of an undelivered order; deleted by Delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub no_o_id: i64,
    pub no_d_id: i64,
    pub no_w_id: i64,
}

impl NewOrder {
    pub fn csv(&self) -> String {
        format!("{},{},{}", self.no_o_id, self.no_d_id, self.no_w_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub ol_o_id: i64,
    pub ol_d_id: i64,
    pub ol_w_id: i64,
    pub ol_number: i64,
    pub ol_i_id: i64,
    pub ol_supply_w_id: i64,
    /// NULL until the line's order is delivered.
    pub ol_delivery_d: Option<i64>,
    pub ol_quantity: i64,
    pub ol_amount: i64,
    pub ol_dist_info: String,
}

impl OrderLine {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.ol_o_id,
            self.ol_d_id,
            self.ol_w_id,
            self.ol_number,
            self.ol_i_id,
            self.ol_supply_w_id,
            opt(self.ol_delivery_d),
            self.ol_quantity,
            self.ol_amount,
            self.ol_dist_info
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub h_c_id: i64,
    pub h_c_d_id: i64,
    pub h_c_w_id: i64,
    pub h_d_id: i64,
    pub h_w_id: i64,
    pub h_date: i64,
    pub h_amount: i64,
    pub h_data: String,
}

impl History {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.h_c_id,
            self.h_c_d_id,
            self.h_c_w_id,
            self.h_d_id,
            self.h_w_id,
            self.h_date,
            self.h_amount,
            self.h_data
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1050), "10.50");
        assert_eq!(format_cents(-1000), "-10.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
    }

    #[test]
    fn test_order_csv_null_carrier() {
        let order = Order {
            o_id: 3001,
            o_d_id: 2,
            o_w_id: 1,
            o_c_id: 17,
            o_entry_d: 1_700_000_000,
            o_carrier_id: None,
            o_ol_cnt: 7,
            o_all_local: 1,
        };
        assert_eq!(order.csv(), "3001,2,1,17,1700000000,,7,1");
        let delivered = Order {
            o_carrier_id: Some(4),
            ..order
        };
        assert_eq!(delivered.csv(), "3001,2,1,17,1700000000,4,7,1");
    }

    #[test]
    fn test_stock_csv_has_seventeen_fields() {
        let stock = Stock {
            s_i_id: 1,
            s_w_id: 1,
            s_quantity: 50,
            s_dist: std::array::from_fn(|i| format!("D{i:023}")),
            s_ytd: 0,
            s_order_cnt: 0,
            s_remote_cnt: 0,
            s_data: "abc".into(),
        };
        assert_eq!(stock.csv().split(',').count(), 17);
    }
}
