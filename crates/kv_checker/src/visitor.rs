use {
    crate::SearchRecord,
    std::sync::{Arc, Mutex},
};

/// Observes the steps of a [`Checker`](crate::Checker) search.
pub trait Visitor {
    fn on_step(&mut self, record: &SearchRecord);
}

impl<F> Visitor for F
where
    F: FnMut(&SearchRecord),
{
    fn on_step(&mut self, record: &SearchRecord) {
        self(record);
    }
}

/// A [`Visitor`] that remembers every step for later inspection.
pub struct SearchRecordingVisitor(Arc<Mutex<Vec<SearchRecord>>>);

impl SearchRecordingVisitor {
    /// Returns the visitor along with a function that replays the steps recorded so far.
    pub fn new_with_replay() -> (Self, impl Fn() -> Vec<SearchRecord>) {
        let visitor = SearchRecordingVisitor(Arc::new(Mutex::new(Vec::new())));
        let records = Arc::clone(&visitor.0);
        let replay = move || match records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        (visitor, replay)
    }
}

impl Visitor for SearchRecordingVisitor {
    fn on_step(&mut self, record: &SearchRecord) {
        match self.0.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}
