//! Datum recording for simulation output and auditing.
//!
//! The kernel reports what happened through a row-oriented sink: a
//! [`Datum`] is one row of a named table, built field by field and then
//! recorded. The in-memory [`Recorder`] keeps every recorded row in
//! order, which enables:
//! - Auditing (the terminal `Finish` row, `Snapshot` rows, `Trades` rows)
//! - Testing (query rows by table and inspect fields)
//! - Export (rows are serde-serializable for host applications)
//!
//! # Example
//!
//! ```
//! use fuelcycle_simulator_core_rs::events::Recorder;
//!
//! let mut rec = Recorder::new();
//! rec.new_datum("Finish")
//!     .add_val("EarlyTerm", false)
//!     .add_val("EndTime", 9i64)
//!     .record();
//!
//! let rows = rec.rows_for_table("Finish");
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].get("EndTime"), Some(&9i64.into()));
//! ```

use serde::{Deserialize, Serialize};

/// A single recorded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One row of a named output table.
///
/// Fields keep their insertion order so exported rows read the way they
/// were built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    table: String,
    vals: Vec<(String, Value)>,
}

impl Datum {
    /// Table this row belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields in insertion order.
    pub fn vals(&self) -> &[(String, Value)] {
        &self.vals
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.vals.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }
}

/// Builder for a [`Datum`], returned by [`Recorder::new_datum`].
///
/// The row is not visible in the recorder until [`record`](Self::record)
/// is called; dropping the builder discards the row.
#[must_use = "a datum does nothing until record() is called"]
pub struct DatumBuilder<'a> {
    recorder: &'a mut Recorder,
    datum: Datum,
}

impl DatumBuilder<'_> {
    /// Append a field to the row.
    pub fn add_val(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.datum.vals.push((field.to_string(), value.into()));
        self
    }

    /// Commit the row to the recorder.
    pub fn record(self) {
        self.recorder.data.push(self.datum);
    }
}

/// In-memory datum sink.
///
/// A durable backend (database, file) is a host concern; the kernel only
/// requires that recorded rows are observable in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recorder {
    data: Vec<Datum>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new row for `table`.
    pub fn new_datum(&mut self, table: &str) -> DatumBuilder<'_> {
        DatumBuilder {
            datum: Datum {
                table: table.to_string(),
                vals: Vec::new(),
            },
            recorder: self,
        }
    }

    /// Number of recorded rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no rows have been recorded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All rows in recording order.
    pub fn rows(&self) -> &[Datum] {
        &self.data
    }

    /// Rows of a single table, in recording order.
    pub fn rows_for_table(&self, table: &str) -> Vec<&Datum> {
        self.data.iter().filter(|d| d.table == table).collect()
    }

    /// Discard all recorded rows.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_fields_in_order() {
        let mut rec = Recorder::new();
        rec.new_datum("Trades")
            .add_val("Time", 3i64)
            .add_val("Commodity", "fuel")
            .add_val("Quantity", 10.0)
            .record();

        assert_eq!(rec.len(), 1);
        let row = &rec.rows()[0];
        assert_eq!(row.table(), "Trades");
        assert_eq!(row.vals()[0].0, "Time");
        assert_eq!(row.get("Quantity"), Some(&Value::Double(10.0)));
        assert_eq!(row.get("Missing"), None);
    }

    #[test]
    fn dropped_builder_records_nothing() {
        let mut rec = Recorder::new();
        let _ = rec.new_datum("Finish").add_val("EarlyTerm", true);
        assert!(rec.is_empty());
    }

    #[test]
    fn rows_for_table_filters() {
        let mut rec = Recorder::new();
        rec.new_datum("A").add_val("x", 1i64).record();
        rec.new_datum("B").add_val("x", 2i64).record();
        rec.new_datum("A").add_val("x", 3i64).record();

        assert_eq!(rec.rows_for_table("A").len(), 2);
        assert_eq!(rec.rows_for_table("B").len(), 1);
        assert_eq!(rec.rows_for_table("C").len(), 0);
    }
}
