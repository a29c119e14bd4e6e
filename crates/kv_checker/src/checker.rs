use {
    crate::{
        BudgetExceeded, CheckResult, CheckerConfig, Mismatch, SearchRecord, SearchStats, Visitor,
    },
    kv_history::{Completion, Event, History},
    kv_model::{KvRet, KvStore, KvUndo, RevertibleSpec},
    std::{collections::HashSet, time::Instant},
    tracing::{debug, trace},
};

/// How often (in steps) the elapsed time is compared against the time budget.
const CLOCK_CHECK_INTERVAL: u64 = 64;

/// Decides whether a [`History`] of key-value store operations is linearizable.
///
/// # Purpose
///
/// Concurrent clients of a replicated store observe overlapping operations. The history they
/// record is *linearizable* if the operations can be arranged in one total order that (1)
/// respects real time, meaning an operation that completed before another began precedes it,
/// and (2) when replayed against a single-node [`KvStore`], reproduces every result the clients
/// actually observed. Operations that never completed ("pending") may take effect at any point
/// after they began, and their results are never checked.
///
/// # Internal Implementation Details
///
/// ```text
/// You can safely ignore this section if you only want to use the library. It is only
/// included as documentation for library contributors.
/// ```
///
/// The search follows _[Testing for Linearizability](https://doi.org/10.1002/cpe.1464)_ by
/// Wing and Gong, with the subproblem caching described by Lowe:
///
/// 1. Events are sorted by completion time, with pending events last.
/// 2. At each step, a candidate is any event not yet linearized that began strictly before the
///    earliest completion among the *other* events not yet linearized. An event that began
///    exactly when another completed is ordered after it, whatever its own length. The one
///    exception is a group of zero-length events at the same instant, which are concurrent.
/// 3. A candidate is applied to the store. If the predicted result matches the observed one,
///    the event is marked linearized and the search descends, starting again from the first
///    candidate. Otherwise the step is taken back and the next candidate is tried.
/// 4. When no candidate remains, the most recently linearized event is taken back and the
///    candidates after it are tried.
/// 5. With memoization enabled, each pair of (linearized events, store contents) is explored
///    at most once.
///
/// The search is iterative. Every step yields a [`KvUndo`] record that is kept on an explicit
/// stack, so the store is never cloned except to populate the memo.
pub struct Checker {
    config: CheckerConfig,
    visitors: Vec<Box<dyn Visitor>>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Checker {
            config,
            visitors: Vec::new(),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn visitor(mut self, visitor: impl Visitor + 'static) -> Self {
        self.visitors.push(Box::new(visitor));
        self
    }

    #[tracing::instrument(skip_all, fields(events = history.len(), pending = history.pending_count()))]
    pub fn check(&mut self, history: &History) -> CheckResult {
        let result = Search::new(history, &self.config, &mut self.visitors).run();
        debug!(verdict = result.verdict(), stats = ?result.stats(), "Checked.");
        result
    }

    /// Panics with a report of the deepest mismatch unless the history is linearizable.
    /// Returns the witness otherwise.
    pub fn assert_linearizable(&mut self, history: &History) -> Vec<Event> {
        match self.check(history) {
            CheckResult::Linearizable { witness, .. } => witness,
            result => {
                println!("{}", result.colored_report());
                panic!("Expected a linearizable history. {}", result.verdict());
            }
        }
    }

    /// Panics with the witness if the history is linearizable (or if the search gave up).
    /// Returns the deepest mismatch otherwise.
    pub fn assert_not_linearizable(&mut self, history: &History) -> Option<Mismatch> {
        match self.check(history) {
            CheckResult::NotLinearizable {
                deepest_mismatch, ..
            } => deepest_mismatch,
            result => {
                println!("{}", result.colored_report());
                if let Some(witness) = result.witness() {
                    println!("Witness:");
                    let mut i = 1;
                    for event in witness {
                        println!("\t{i}. {event}");
                        i += 1;
                    }
                }
                panic!("Expected a history that is not linearizable. {}", result.verdict());
            }
        }
    }
}

/// Checks a history with the default configuration. Never indeterminate.
pub fn is_linearizable(history: &History) -> bool {
    Checker::new().check(history).is_linearizable()
}

struct Frame {
    /// Position in `Search::events`.
    index: usize,
    undo: KvUndo,
}

struct Search<'a> {
    config: &'a CheckerConfig,
    visitors: &'a mut [Box<dyn Visitor>],
    events: Vec<&'a Event>,
    linearized: Vec<bool>,
    store: KvStore,
    stack: Vec<Frame>,
    memo: HashSet<(Vec<bool>, KvStore)>,
    deepest_mismatch: Option<Mismatch>,
    stats: SearchStats,
    started: Instant,
}

impl<'a> Search<'a> {
    fn new(
        history: &'a History,
        config: &'a CheckerConfig,
        visitors: &'a mut [Box<dyn Visitor>],
    ) -> Self {
        let events = history.by_end();
        Search {
            config,
            visitors,
            linearized: vec![false; events.len()],
            events,
            store: KvStore::new(),
            stack: Vec::new(),
            memo: HashSet::new(),
            deepest_mismatch: None,
            stats: SearchStats::default(),
            started: Instant::now(),
        }
    }

    fn run(mut self) -> CheckResult {
        let mut cursor = 0;
        loop {
            if self.stack.len() == self.events.len() {
                let witness = self
                    .stack
                    .iter()
                    .map(|frame| self.events[frame.index].clone())
                    .collect();
                return CheckResult::Linearizable {
                    witness,
                    stats: self.stats,
                };
            }
            if let Some(reason) = self.exceeded_budget() {
                return CheckResult::Indeterminate {
                    reason,
                    stats: self.stats,
                };
            }
            match self.next_candidate(cursor) {
                Some(index) => cursor = self.try_candidate(index),
                None => match self.backtrack() {
                    Some(resume) => cursor = resume,
                    None => {
                        return CheckResult::NotLinearizable {
                            deepest_mismatch: self.deepest_mismatch,
                            stats: self.stats,
                        }
                    }
                },
            }
        }
    }

    fn exceeded_budget(&self) -> Option<BudgetExceeded> {
        if let Some(budget) = self.config.step_budget {
            if self.stats.steps >= budget {
                return Some(BudgetExceeded::Steps(budget));
            }
        }
        if let Some(budget) = self.config.time_budget {
            if self.stats.steps % CLOCK_CHECK_INTERVAL == 0 && self.started.elapsed() >= budget {
                return Some(BudgetExceeded::Time(budget));
            }
        }
        None
    }

    /// The position and completion of the first event not yet linearized, along with the
    /// completion of the second. Events are sorted by completion, so these are the two earliest.
    fn earliest_ends(&self) -> Option<(usize, Completion, Option<Completion>)> {
        let mut remaining = self
            .linearized
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(index, _)| index);
        let first = remaining.next()?;
        let second = remaining.next().map(|index| self.events[index].end());
        Some((first, self.events[first].end(), second))
    }

    /// The first candidate at or after `cursor`. Start times are unordered, so every remaining
    /// event is examined.
    fn next_candidate(&self, cursor: usize) -> Option<usize> {
        let (first, first_end, second_end) = self.earliest_ends()?;
        (cursor..self.events.len()).find(|&index| {
            let others_end = if index == first {
                second_end
            } else {
                Some(first_end)
            };
            !self.linearized[index] && self.is_unblocked(index, others_end)
        })
    }

    /// Whether no other event left to linearize completed at or before the event at `index`
    /// began. `others_end` is the earliest completion among those other events.
    fn is_unblocked(&self, index: usize, others_end: Option<Completion>) -> bool {
        let event = self.events[index];
        let start = Completion::Returned(event.start());
        match others_end {
            None => true,
            Some(end) if start < end => true,
            // Instants at the same time precede each other, so they are treated as concurrent.
            Some(end) if start == end && event.end() == end => {
                (0..self.events.len()).all(|other| {
                    let other_event = self.events[other];
                    other == index
                        || self.linearized[other]
                        || other_event.end() != end
                        || other_event.start() == event.start()
                })
            }
            Some(_) => false,
        }
    }

    /// Applies the candidate and returns where the scan for the next candidate resumes.
    fn try_candidate(&mut self, index: usize) -> usize {
        let event = self.events[index];
        let depth = self.stack.len();
        self.stats.steps += 1;
        let (predicted, undo) = self.store.invoke_revertible(event.op());

        if let Some(observed) = event.required_result() {
            if observed != &predicted {
                self.emit(|| SearchRecord::Rejected {
                    depth,
                    event: event.id(),
                    op: event.op().clone(),
                    predicted: predicted.clone(),
                    observed: observed.clone(),
                });
                self.note_mismatch(index, predicted, observed.clone());
                self.store.revert(undo);
                return index + 1;
            }
        }

        self.linearized[index] = true;
        if self.config.memoize
            && !self
                .memo
                .insert((self.linearized.clone(), self.store.clone()))
        {
            self.stats.memo_hits += 1;
            self.emit(|| SearchRecord::Revisited {
                depth,
                event: event.id(),
                op: event.op().clone(),
            });
            self.linearized[index] = false;
            self.store.revert(undo);
            return index + 1;
        }

        self.emit(|| SearchRecord::Applied {
            depth,
            event: event.id(),
            op: event.op().clone(),
            predicted,
        });
        self.stack.push(Frame { index, undo });
        self.stats.max_depth = self.stats.max_depth.max(self.stack.len());
        0
    }

    /// Takes back the most recent step. Returns where the scan for the next candidate resumes,
    /// or `None` if nothing is left to take back.
    fn backtrack(&mut self) -> Option<usize> {
        let Frame { index, undo } = self.stack.pop()?;
        let event = self.events[index];
        self.linearized[index] = false;
        self.store.revert(undo);
        self.stats.backtracks += 1;
        let depth = self.stack.len();
        self.emit(|| SearchRecord::Backtracked {
            depth,
            event: event.id(),
            op: event.op().clone(),
        });
        Some(index + 1)
    }

    /// Keeps the first mismatch found at the greatest depth.
    fn note_mismatch(&mut self, index: usize, predicted: KvRet, observed: KvRet) {
        let depth = self.stack.len();
        if matches!(&self.deepest_mismatch, Some(best) if best.depth >= depth) {
            return;
        }
        let prefix = self
            .stack
            .iter()
            .map(|frame| frame.index)
            .chain(Some(index))
            .map(|i| self.events[i].clone())
            .collect();
        self.deepest_mismatch = Some(Mismatch {
            depth,
            event: self.events[index].id(),
            predicted,
            observed,
            prefix,
        });
    }

    fn emit(&mut self, record: impl FnOnce() -> SearchRecord) {
        if self.visitors.is_empty() && !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        let record = record();
        trace!(%record, "Step.");
        for visitor in self.visitors.iter_mut() {
            visitor.on_step(&record);
        }
    }
}
