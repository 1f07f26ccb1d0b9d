use std::cell::RefCell;
use std::rc::Rc;

use crate::table::TableSnapshot;

/// Receives the full row sequence after every table mutation.
pub trait ChangeNotifier {
    fn notify(&mut self, snapshot: &TableSnapshot);
}

impl<F> ChangeNotifier for F
where
    F: FnMut(&TableSnapshot),
{
    fn notify(&mut self, snapshot: &TableSnapshot) {
        self(snapshot)
    }
}

#[derive(Default)]
struct SinkState {
    latest: Option<TableSnapshot>,
    changes: usize,
}

/// Keeps the latest snapshot handed out by the table.
///
/// Clones share the same state, one clone is given to the table and the other
/// stays with the owner.
#[derive(Clone, Default)]
pub struct SnapshotSink {
    state: Rc<RefCell<SinkState>>,
}

impl SnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<TableSnapshot> {
        self.state.borrow().latest.clone()
    }

    pub fn changes(&self) -> usize {
        self.state.borrow().changes
    }

    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.latest = None;
        state.changes = 0;
    }
}

impl ChangeNotifier for SnapshotSink {
    fn notify(&mut self, snapshot: &TableSnapshot) {
        let mut state = self.state.borrow_mut();
        state.latest = Some(snapshot.clone());
        state.changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::table::TableModel;

    #[test]
    fn sink_tracks_latest_snapshot() {
        let sink = SnapshotSink::new();
        let mut table = TableModel::new(Box::new(SequentialIds::default()))
            .with_notifier(Box::new(sink.clone()));
        table.load(vec!["name".to_string()], Vec::new());
        assert_eq!(sink.changes(), 0);

        table.add_row();
        table.add_row();
        assert_eq!(sink.changes(), 2);
        assert_eq!(sink.latest().map(|s| s.len()), Some(2));

        sink.reset();
        assert_eq!(sink.changes(), 0);
        assert!(sink.latest().is_none());
    }

    #[test]
    fn closures_are_notifiers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = Rc::clone(&seen);
        let mut table = TableModel::new(Box::new(SequentialIds::default())).with_notifier(
            Box::new(move |s: &TableSnapshot| seen_c.borrow_mut().push(s.len())),
        );
        table.load(vec!["name".to_string()], Vec::new());
        table.add_row();
        assert_eq!(*seen.borrow(), vec![1]);
    }
}
