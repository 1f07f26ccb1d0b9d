use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::ids::IdGenerator;
use crate::notifier::ChangeNotifier;
use crate::schema::{ColumnSchema, Value};

/// Key under which a row's identity travels in a record.
pub const ID_KEY: &str = "id";

/// A row as handed in by a loader or out to a consumer: column name to value.
pub type Record = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: String,
    values: Vec<Value>, // One value per column, in schema order
}

impl Row {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, column_idx: usize) -> Option<&Value> {
        self.values.get(column_idx)
    }

    pub fn get(&self, schema: &ColumnSchema, column: &str) -> Option<&Value> {
        schema.index_of(column).and_then(|idx| self.values.get(idx))
    }

    pub fn to_record(&self, schema: &ColumnSchema) -> Record {
        let mut record: Record = schema
            .names()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        record.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        record
    }
}

/// Read only view of the table at one point in time.
///
/// Cheap to clone; later mutations of the table never show up in an existing snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    schema: Arc<ColumnSchema>,
    rows: Arc<Vec<Arc<Row>>>,
}

impl TableSnapshot {
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| row.to_record(&self.schema))
            .collect()
    }
}

/// Outcome of a mutation addressed by row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    RowNotFound,
    ColumnNotFound,
}

impl Mutation {
    pub fn is_applied(&self) -> bool {
        *self == Mutation::Applied
    }
}

/// The in-memory row store of one loaded dataset.
pub struct TableModel {
    schema: Arc<ColumnSchema>,
    rows: Arc<Vec<Arc<Row>>>,
    ids: Box<dyn IdGenerator>,
    notifier: Option<Box<dyn ChangeNotifier>>,
}

impl TableModel {
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            schema: Arc::new(ColumnSchema::default()),
            rows: Arc::new(Vec::new()),
            ids,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replaces columns and rows wholesale.
    ///
    /// Records are normalized to the column set: missing values become `Null`,
    /// unknown keys are dropped. A record's `id` is kept unless it is missing or
    /// already taken, then a fresh one is generated.
    pub fn load(&mut self, columns: Vec<String>, records: Vec<Record>) {
        let columns: Vec<String> = columns.into_iter().filter(|c| c != ID_KEY).collect();
        let schema = ColumnSchema::infer(&columns, records.first());

        let mut taken: HashSet<String> = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for (ridx, mut record) in records.into_iter().enumerate() {
            let supplied = match record.remove(ID_KEY) {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                Some(v @ Value::Number(_)) => Some(v.to_string()),
                _ => None,
            };
            let id = match supplied {
                Some(id) if !taken.contains(&id) => id,
                Some(id) => {
                    warn!("Row {ridx} repeats id \"{id}\", assigning a new one");
                    self.fresh_id(&taken)
                }
                None => self.fresh_id(&taken),
            };

            let values = columns
                .iter()
                .map(|name| {
                    record.remove(name).unwrap_or_else(|| {
                        debug!("Row {ridx} has no value for \"{name}\"");
                        Value::Null
                    })
                })
                .collect();
            if !record.is_empty() {
                debug!(
                    "Row {ridx} drops unknown keys {:?}",
                    record.keys().collect::<Vec<_>>()
                );
            }

            taken.insert(id.clone());
            rows.push(Arc::new(Row { id, values }));
        }

        info!("Loaded {} rows with {} columns", rows.len(), schema.len());
        self.schema = Arc::new(schema);
        self.rows = Arc::new(rows);
    }

    fn fresh_id(&mut self, taken: &HashSet<String>) -> String {
        loop {
            let id = self.ids.next_id();
            if !taken.contains(&id) {
                return id;
            }
        }
    }

    /// Sets one cell. The row keeps its position, every other row is shared with
    /// earlier snapshots.
    pub fn update_cell(&mut self, row_id: &str, column: &str, value: Value) -> Mutation {
        let outcome = match (self.position(row_id), self.schema.index_of(column)) {
            (None, _) => Mutation::RowNotFound,
            (Some(_), None) => Mutation::ColumnNotFound,
            (Some(ridx), Some(cidx)) => {
                let rows = Arc::make_mut(&mut self.rows);
                let mut row = Row::clone(&rows[ridx]);
                trace!("Update {row_id}:{column} {:?} => {:?}", row.values[cidx], value);
                row.values[cidx] = value;
                rows[ridx] = Arc::new(row);
                Mutation::Applied
            }
        };
        if outcome == Mutation::ColumnNotFound {
            debug!("Update of unknown column \"{column}\" ignored");
        }
        self.notify();
        outcome
    }

    /// Appends a row with type defaults and returns its id.
    pub fn add_row(&mut self) -> String {
        let taken: HashSet<String> = self.rows.iter().map(|r| r.id.clone()).collect();
        let id = self.fresh_id(&taken);
        let row = Row {
            id: id.clone(),
            values: self.schema.default_values(),
        };
        Arc::make_mut(&mut self.rows).push(Arc::new(row));
        debug!("Added row {id}, {} rows", self.rows.len());
        self.notify();
        id
    }

    pub fn delete_row(&mut self, row_id: &str) -> Mutation {
        let outcome = match self.position(row_id) {
            Some(ridx) => {
                Arc::make_mut(&mut self.rows).remove(ridx);
                debug!("Deleted row {row_id}, {} rows", self.rows.len());
                Mutation::Applied
            }
            None => Mutation::RowNotFound,
        };
        self.notify();
        outcome
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.notify(&snapshot);
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            schema: Arc::clone(&self.schema),
            rows: Arc::clone(&self.rows),
        }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn position(&self, row_id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == row_id)
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.position(row_id).map(|idx| self.rows[idx].as_ref())
    }

    pub fn value(&self, row_id: &str, column: &str) -> Option<&Value> {
        self.row(row_id).and_then(|r| r.get(&self.schema, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::notifier::SnapshotSink;
    use crate::schema::ValueType;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn people() -> (TableModel, SnapshotSink) {
        let sink = SnapshotSink::new();
        let mut table = TableModel::new(Box::new(SequentialIds::new("new-")))
            .with_notifier(Box::new(sink.clone()));
        table.load(
            columns(&["name", "age", "active"]),
            vec![
                record(&[
                    ("id", "r1".into()),
                    ("name", "Ann".into()),
                    ("age", 30.0.into()),
                    ("active", true.into()),
                ]),
                record(&[
                    ("id", "r2".into()),
                    ("name", "Bob".into()),
                    ("age", 41.0.into()),
                    ("active", false.into()),
                ]),
                record(&[
                    ("id", "r3".into()),
                    ("name", "Cid".into()),
                    ("age", Value::Null),
                    ("active", true.into()),
                ]),
            ],
        );
        (table, sink)
    }

    #[test]
    fn load_normalizes_keys() {
        let mut table = TableModel::new(Box::new(SequentialIds::default()));
        table.load(
            columns(&["a", "b"]),
            vec![
                record(&[("a", 1.0.into()), ("b", "x".into())]),
                record(&[("a", 2.0.into())]),
                record(&[("b", "y".into()), ("extra", true.into())]),
            ],
        );

        for r in table.snapshot().records() {
            let mut keys: Vec<_> = r.keys().cloned().collect();
            keys.sort();
            assert_eq!(keys, vec!["a", "b", "id"]);
        }
        assert_eq!(table.rows()[1].values(), &[Value::from(2.0), Value::Null]);
        assert_eq!(table.rows()[2].values(), &[Value::Null, Value::from("y")]);
    }

    #[test]
    fn load_keeps_supplied_ids_and_fixes_duplicates() {
        let mut table = TableModel::new(Box::new(SequentialIds::default()));
        table.load(
            columns(&["id", "a"]),
            vec![
                record(&[("a", "x".into())]),
                record(&[("id", "r1".into()), ("a", "y".into())]),
                record(&[("id", 7.0.into()), ("a", "z".into())]),
            ],
        );
        let ids: Vec<&str> = table.rows().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r1", "r2", "7"]);
        assert_eq!(table.schema().len(), 1);
    }

    #[test]
    fn load_replaces_previous_table() {
        let (mut table, sink) = people();
        table.load(columns(&["city"]), vec![record(&[("city", "Graz".into())])]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.schema().names().collect::<Vec<_>>(), vec!["city"]);
        assert_eq!(sink.changes(), 0);
    }

    #[test]
    fn update_cell_touches_only_one_value() {
        let (mut table, sink) = people();
        let before = table.snapshot();

        assert_eq!(table.update_cell("r2", "name", "Bea".into()), Mutation::Applied);

        assert_eq!(table.value("r2", "name"), Some(&Value::from("Bea")));
        assert_eq!(table.value("r2", "age"), Some(&Value::from(41.0)));
        assert_eq!(table.position("r2"), Some(1));
        assert_eq!(sink.changes(), 1);

        // The old snapshot is untouched and unaffected rows are shared
        assert_eq!(before.rows()[1].get(before.schema(), "name"), Some(&Value::from("Bob")));
        let after = table.snapshot();
        assert!(Arc::ptr_eq(&before.rows()[0], &after.rows()[0]));
        assert!(!Arc::ptr_eq(&before.rows()[1], &after.rows()[1]));
    }

    #[test]
    fn update_cell_reports_missing_targets() {
        let (mut table, sink) = people();
        let before = table.snapshot();
        assert_eq!(table.update_cell("nope", "name", "X".into()), Mutation::RowNotFound);
        assert_eq!(table.update_cell("r1", "nope", "X".into()), Mutation::ColumnNotFound);
        assert_eq!(table.snapshot(), before);
        assert_eq!(sink.changes(), 2);
    }

    #[test]
    fn last_write_wins() {
        let (mut table, _) = people();
        table.update_cell("r1", "age", 31.0.into());
        table.update_cell("r1", "age", 32.0.into());
        assert_eq!(table.value("r1", "age"), Some(&Value::from(32.0)));
    }

    #[test]
    fn add_row_uses_schema_defaults() {
        let (mut table, sink) = people();
        let id = table.add_row();
        assert_eq!(id, "new-1");
        assert_eq!(table.position(&id), Some(3));
        assert_eq!(
            table.row(&id).map(|r| r.values().to_vec()),
            Some(vec![Value::from(""), Value::Null, Value::from(false)])
        );
        assert_eq!(sink.changes(), 1);
    }

    #[test]
    fn add_row_on_empty_load_defaults_to_text() {
        let mut table = TableModel::new(Box::new(SequentialIds::default()));
        table.load(columns(&["a", "b"]), Vec::new());
        assert!(table.schema().columns().iter().all(|c| c.value_type == ValueType::String));

        let id = table.add_row();
        assert_eq!(
            table.row(&id).map(|r| r.values().to_vec()),
            Some(vec![Value::from(""), Value::from("")])
        );
    }

    #[test]
    fn add_row_skips_taken_ids() {
        let mut table = TableModel::new(Box::new(SequentialIds::default()));
        table.load(columns(&["a"]), vec![record(&[("id", "r1".into())])]);
        assert_eq!(table.add_row(), "r2");
    }

    #[test]
    fn add_then_delete_restores_rows() {
        let (mut table, _) = people();
        let before = table.snapshot().records();
        let id = table.add_row();
        assert_eq!(table.delete_row(&id), Mutation::Applied);
        assert_eq!(table.snapshot().records(), before);
    }

    #[test]
    fn delete_keeps_other_ids() {
        let (mut table, _) = people();
        table.delete_row("r2");
        let ids: Vec<&str> = table.rows().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn delete_unknown_row_still_notifies() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_c = std::rc::Rc::clone(&seen);
        let (table, _) = people();
        let before = table.snapshot();
        let mut table = table.with_notifier(Box::new(move |s: &TableSnapshot| {
            seen_c.borrow_mut().push(s.clone())
        }));

        assert_eq!(table.delete_row("nonexistent"), Mutation::RowNotFound);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 3);
        assert_eq!(seen[0], before);
    }
}
