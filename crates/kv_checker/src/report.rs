use {
    colorful::{Color, Colorful},
    kv_history::{Event, EventId},
    kv_model::KvRet,
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
};

/// The verdict of a [`Checker`](crate::Checker).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum CheckResult {
    /// A total order consistent with real time and the store's semantics exists. `witness` is
    /// one such order.
    Linearizable {
        witness: Vec<Event>,
        stats: SearchStats,
    },
    /// No such order exists. The mismatch at the greatest depth is included when the search
    /// ever got as far as predicting a result.
    NotLinearizable {
        deepest_mismatch: Option<Mismatch>,
        stats: SearchStats,
    },
    /// The search gave up before reaching a verdict.
    Indeterminate {
        reason: BudgetExceeded,
        stats: SearchStats,
    },
}

impl CheckResult {
    pub fn is_linearizable(&self) -> bool {
        matches!(self, CheckResult::Linearizable { .. })
    }

    pub fn is_not_linearizable(&self) -> bool {
        matches!(self, CheckResult::NotLinearizable { .. })
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, CheckResult::Indeterminate { .. })
    }

    pub fn witness(&self) -> Option<&[Event]> {
        match self {
            CheckResult::Linearizable { witness, .. } => Some(witness),
            _ => None,
        }
    }

    pub fn deepest_mismatch(&self) -> Option<&Mismatch> {
        match self {
            CheckResult::NotLinearizable {
                deepest_mismatch, ..
            } => deepest_mismatch.as_ref(),
            _ => None,
        }
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            CheckResult::Linearizable { stats, .. }
            | CheckResult::NotLinearizable { stats, .. }
            | CheckResult::Indeterminate { stats, .. } => stats,
        }
    }

    /// A short label for the verdict, e.g. for machine-readable output.
    pub fn verdict(&self) -> &'static str {
        match self {
            CheckResult::Linearizable { .. } => "linearizable",
            CheckResult::NotLinearizable { .. } => "not linearizable",
            CheckResult::Indeterminate { .. } => "indeterminate",
        }
    }

    /// Like the [`Display`] output, with the verdict highlighted for a terminal.
    pub fn colored_report(&self) -> String {
        let headline = self.headline();
        let headline = match self {
            CheckResult::Linearizable { .. } => headline.color(Color::Green).to_string(),
            CheckResult::NotLinearizable { .. } => headline.color(Color::Red).to_string(),
            CheckResult::Indeterminate { .. } => headline.color(Color::Yellow).to_string(),
        };
        let mut out = headline;
        self.write_details(&mut out);
        out
    }

    fn headline(&self) -> String {
        match self {
            CheckResult::Linearizable { .. } => "History is linearizable.".to_string(),
            CheckResult::NotLinearizable { .. } => "History is NOT linearizable.".to_string(),
            CheckResult::Indeterminate { reason, .. } => {
                format!("Linearizability is undetermined: {reason}.")
            }
        }
    }

    fn write_details(&self, out: &mut String) {
        use std::fmt::Write;
        // Writing to a `String` cannot fail.
        let _ = writeln!(out);
        if let Some(mismatch) = self.deepest_mismatch() {
            let _ = write!(out, "{mismatch}");
        }
        let _ = write!(out, "{}", self.stats());
    }
}

impl Display for CheckResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut details = String::new();
        self.write_details(&mut details);
        write!(f, "{}{details}", self.headline())
    }
}

/// The point where a candidate linearization diverged from what a client observed.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    /// Number of events linearized before the divergent one.
    pub depth: usize,
    pub event: EventId,
    pub predicted: KvRet,
    pub observed: KvRet,
    /// The events linearized before the divergent one, in order, followed by that event.
    pub prefix: Vec<Event>,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Deepest mismatch after {} linearized events: {} predicted {}, observed {}.",
            self.depth, self.event, self.predicted, self.observed
        )?;
        let mut i = 1;
        for event in &self.prefix {
            writeln!(f, "\t{i}. {event}")?;
            i += 1;
        }
        Ok(())
    }
}

/// Counters describing the work a search performed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub struct SearchStats {
    /// Candidate events applied to the store.
    pub steps: u64,
    /// Applied events later taken back.
    pub backtracks: u64,
    /// Subproblems skipped because they were already explored.
    pub memo_hits: u64,
    /// The most events linearized at once.
    pub max_depth: usize,
}

impl Display for SearchStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Explored {} steps ({} backtracks, {} memo hits), reaching depth {}.",
            self.steps, self.backtracks, self.memo_hits, self.max_depth
        )
    }
}

/// Why a search stopped early.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BudgetExceeded {
    Steps(u64),
    Time(Duration),
}

impl Display for BudgetExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BudgetExceeded::Steps(steps) => write!(f, "step budget of {steps} exhausted"),
            BudgetExceeded::Time(duration) => write!(f, "time budget of {duration:?} exhausted"),
        }
    }
}
