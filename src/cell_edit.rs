use tracing::{debug, trace};

use crate::domain::TabError;
use crate::schema::{Value, ValueType};
use crate::table::{Mutation, TableModel};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditState {
    #[default]
    Viewing,
    Editing {
        snapshot: Value, // Committed value when editing started
        buffer: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Editing,
    Toggled(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Unchanged,
    Applied(Value),
}

/// Edit state machine of a single cell.
///
/// Text and number cells go through `Viewing -> Editing -> Viewing`, booleans are
/// toggled on activation and never hold a buffer.
#[derive(Debug, Clone)]
pub struct CellEditController {
    row_id: String,
    column: String,
    value_type: ValueType,
    state: EditState,
}

impl CellEditController {
    pub fn new(row_id: impl Into<String>, column: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            row_id: row_id.into(),
            column: column.into(),
            value_type,
            state: EditState::Viewing,
        }
    }

    /// Controller for a cell of `table`, typed by the table's schema.
    pub fn for_cell(table: &TableModel, row_id: &str, column: &str) -> Option<Self> {
        table.row(row_id)?;
        let value_type = table.schema().value_type(column)?;
        Some(Self::new(row_id, column, value_type))
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing { .. })
    }

    pub fn buffer(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { buffer, .. } => Some(buffer),
            EditState::Viewing => None,
        }
    }

    /// Pointer activation: toggles booleans right away, starts editing otherwise.
    pub fn activate(&mut self, table: &mut TableModel) -> Result<Activation, TabError> {
        if self.value_type != ValueType::Boolean {
            self.enter_edit(table)?;
            return Ok(Activation::Editing);
        }

        let current = table
            .value(&self.row_id, &self.column)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let toggled = !current;
        trace!("Toggle {}:{} to {toggled}", self.row_id, self.column);
        table.update_cell(&self.row_id, &self.column, Value::Boolean(toggled));
        Ok(Activation::Toggled(toggled))
    }

    pub fn enter_edit(&mut self, table: &TableModel) -> Result<(), TabError> {
        if self.value_type == ValueType::Boolean {
            return Err(TabError::NotEditable(self.column.clone()));
        }
        if self.is_editing() {
            return Ok(());
        }
        let snapshot = table
            .value(&self.row_id, &self.column)
            .cloned()
            .unwrap_or_default();
        let buffer = snapshot.to_string();
        self.state = EditState::Editing { snapshot, buffer };
        Ok(())
    }

    pub fn update_buffer(&mut self, text: impl Into<String>) {
        if let EditState::Editing { buffer, .. } = &mut self.state {
            *buffer = text.into();
        }
    }

    /// Writes the buffer back to `table` if it differs from the value editing started with.
    ///
    /// A buffer that is not a number in a number cell is rejected, the cell stays in edit mode.
    pub fn commit(&mut self, table: &mut TableModel) -> Result<Commit, TabError> {
        let EditState::Editing { snapshot, buffer } = &self.state else {
            return Ok(Commit::Unchanged);
        };

        if *buffer == snapshot.to_string() {
            self.state = EditState::Viewing;
            return Ok(Commit::Unchanged);
        }
        let value = self.coerce(buffer)?;
        if value == *snapshot {
            self.state = EditState::Viewing;
            return Ok(Commit::Unchanged);
        }

        let outcome = table.update_cell(&self.row_id, &self.column, value.clone());
        if outcome != Mutation::Applied {
            debug!("Commit to {}:{} had no target: {outcome:?}", self.row_id, self.column);
        }
        self.state = EditState::Viewing;
        Ok(Commit::Applied(value))
    }

    pub fn cancel(&mut self) {
        if self.is_editing() {
            trace!("Cancel edit of {}:{}", self.row_id, self.column);
        }
        self.state = EditState::Viewing;
    }

    fn coerce(&self, buffer: &str) -> Result<Value, TabError> {
        match self.value_type {
            ValueType::String => Ok(Value::String(buffer.to_string())),
            ValueType::Number => {
                let text = buffer.trim();
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                match text.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(Value::Number(n)),
                    _ => Err(TabError::InvalidNumber(buffer.to_string())),
                }
            }
            ValueType::Boolean => Err(TabError::NotEditable(self.column.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::notifier::SnapshotSink;
    use crate::table::Record;

    fn ann() -> (TableModel, SnapshotSink) {
        let sink = SnapshotSink::new();
        let mut table = TableModel::new(Box::new(SequentialIds::default()))
            .with_notifier(Box::new(sink.clone()));
        let record: Record = [
            ("id", Value::from("r1")),
            ("name", Value::from("Ann")),
            ("age", Value::from(30.0)),
            ("active", Value::from(true)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        table.load(
            vec!["name".to_string(), "age".to_string(), "active".to_string()],
            vec![record],
        );
        (table, sink)
    }

    fn cell(table: &TableModel, column: &str) -> CellEditController {
        CellEditController::for_cell(table, "r1", column).unwrap()
    }

    #[test]
    fn toggle_boolean_cell() {
        let (mut table, sink) = ann();
        let mut active = cell(&table, "active");

        assert_eq!(active.activate(&mut table).unwrap(), Activation::Toggled(false));
        assert!(!active.is_editing());

        let snapshot = sink.latest().unwrap();
        assert_eq!(sink.changes(), 1);
        let records = snapshot.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], Value::from("r1"));
        assert_eq!(records[0]["name"], Value::from("Ann"));
        assert_eq!(records[0]["age"], Value::from(30.0));
        assert_eq!(records[0]["active"], Value::from(false));
    }

    #[test]
    fn boolean_cells_never_edit() {
        let (table, _) = ann();
        let mut active = cell(&table, "active");
        assert!(matches!(
            active.enter_edit(&table),
            Err(TabError::NotEditable(_))
        ));
        assert_eq!(active.state, EditState::Viewing);
    }

    #[test]
    fn null_boolean_toggles_on() {
        let (mut table, _) = ann();
        table.update_cell("r1", "active", Value::Null);
        let mut active = cell(&table, "active");
        assert_eq!(active.activate(&mut table).unwrap(), Activation::Toggled(true));
    }

    #[test]
    fn clearing_a_number_commits_null() {
        let (mut table, sink) = ann();
        let mut age = cell(&table, "age");

        assert_eq!(age.activate(&mut table).unwrap(), Activation::Editing);
        assert_eq!(age.buffer(), Some("30"));
        age.update_buffer("");
        assert_eq!(age.commit(&mut table).unwrap(), Commit::Applied(Value::Null));

        assert_eq!(table.value("r1", "age"), Some(&Value::Null));
        assert_eq!(sink.changes(), 1);
        assert_eq!(age.state, EditState::Viewing);
    }

    #[test]
    fn unchanged_commit_is_a_noop() {
        let (mut table, sink) = ann();
        let mut name = cell(&table, "name");
        name.enter_edit(&table).unwrap();
        assert_eq!(name.commit(&mut table).unwrap(), Commit::Unchanged);

        let mut age = cell(&table, "age");
        age.enter_edit(&table).unwrap();
        age.update_buffer("30.0");
        assert_eq!(age.commit(&mut table).unwrap(), Commit::Unchanged);

        assert_eq!(sink.changes(), 0);
    }

    #[test]
    fn cancel_never_updates() {
        let (mut table, sink) = ann();
        let mut name = cell(&table, "name");
        name.enter_edit(&table).unwrap();
        name.update_buffer("Annabel");
        name.update_buffer("");
        name.cancel();

        assert_eq!(name.state, EditState::Viewing);
        assert_eq!(name.commit(&mut table).unwrap(), Commit::Unchanged);
        assert_eq!(table.value("r1", "name"), Some(&Value::from("Ann")));
        assert_eq!(sink.changes(), 0);
    }

    #[test]
    fn text_commit_passes_buffer_through() {
        let (mut table, sink) = ann();
        let mut name = cell(&table, "name");
        name.enter_edit(&table).unwrap();
        name.update_buffer("  Anna ");
        assert_eq!(
            name.commit(&mut table).unwrap(),
            Commit::Applied(Value::from("  Anna "))
        );
        assert_eq!(sink.changes(), 1);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let (mut table, sink) = ann();
        let mut age = cell(&table, "age");
        age.enter_edit(&table).unwrap();

        for input in ["thirty", "NaN", "inf"] {
            age.update_buffer(input);
            assert!(matches!(age.commit(&mut table), Err(TabError::InvalidNumber(_))));
            assert_eq!(age.buffer(), Some(input));
        }

        age.update_buffer(" 31 ");
        assert_eq!(
            age.commit(&mut table).unwrap(),
            Commit::Applied(Value::from(31.0))
        );
        assert_eq!(sink.changes(), 1);
    }

    #[test]
    fn update_buffer_while_viewing_is_ignored() {
        let (table, _) = ann();
        let mut name = cell(&table, "name");
        name.update_buffer("ignored");
        assert_eq!(name.buffer(), None);
        assert!(CellEditController::for_cell(&table, "r9", "name").is_none());
        assert!(CellEditController::for_cell(&table, "r1", "nope").is_none());
    }
}
