use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::graph::Description;
use crate::runner::host::{Failure, RunNotifier};

/// A terminal report waiting to be relayed.
#[derive(Debug, Clone)]
enum Terminal {
    Failure(Failure),
    AssumptionFailed(Failure),
    Finished(Description),
}

impl Terminal {
    fn key(&self) -> String {
        match self {
            Self::Failure(f) | Self::AssumptionFailed(f) => key(&f.description),
            Self::Finished(d) => key(d),
        }
    }
}

#[derive(Debug, Default)]
struct Sequencer {
    /// Key of the test whose start was relayed and whose end was not.
    in_flight: Option<String>,
    starts: VecDeque<Description>,
    terminals: VecDeque<Terminal>,
    ignored: VecDeque<(Description, String)>,
    /// Keys whose terminal report was already accepted.
    finished: HashSet<String>,
}

fn key(description: &Description) -> String {
    description
        .unique_id
        .clone()
        .unwrap_or_else(|| description.display_name())
}

/// Notifier decorator for parallel execution.
///
/// Tests may start and end on many threads at once, but the legacy host
/// expects one test at a time. Reports are queued and relayed so that at
/// most one test is in flight: starts go out in arrival order, each
/// followed by its terminal report before the next start. A terminal
/// report is relayed once, followed by `finished`; duplicates for the same
/// test are dropped. Ignored tests and terminal reports for tests that
/// never started go out whenever no test is in flight.
pub struct ParallelRunNotifier<'a> {
    delegate: &'a dyn RunNotifier,
    state: Mutex<Sequencer>,
}

impl<'a> ParallelRunNotifier<'a> {
    pub fn new(delegate: &'a dyn RunNotifier) -> Self {
        Self {
            delegate,
            state: Mutex::new(Sequencer::default()),
        }
    }

    fn accept_terminal(&self, terminal: Terminal) {
        let mut state = self.state.lock();
        if state.finished.insert(terminal.key()) {
            state.terminals.push_back(terminal);
            self.pump(&mut state);
        }
    }

    /// Relay everything that may go out now.
    fn pump(&self, state: &mut Sequencer) {
        loop {
            if let Some(current) = &state.in_flight {
                let Some(position) = state.terminals.iter().position(|t| &t.key() == current)
                else {
                    return;
                };
                if let Some(terminal) = state.terminals.remove(position) {
                    self.emit(terminal);
                }
                state.in_flight = None;
                continue;
            }

            for (description, reason) in state.ignored.drain(..) {
                self.delegate.fire_test_ignored(&description, &reason);
            }
            let pending: HashSet<String> = state.starts.iter().map(key).collect();
            let (orphans, waiting): (VecDeque<Terminal>, VecDeque<Terminal>) = state
                .terminals
                .drain(..)
                .partition(|t| !pending.contains(&t.key()));
            state.terminals = waiting;
            for terminal in orphans {
                self.emit(terminal);
            }

            let Some(next) = state.starts.pop_front() else {
                return;
            };
            self.delegate.fire_test_started(&next);
            state.in_flight = Some(key(&next));
        }
    }

    fn emit(&self, terminal: Terminal) {
        match terminal {
            Terminal::Failure(failure) => {
                self.delegate.fire_test_failure(&failure);
                self.delegate.fire_test_finished(&failure.description);
            }
            Terminal::AssumptionFailed(failure) => {
                self.delegate.fire_test_assumption_failed(&failure);
                self.delegate.fire_test_finished(&failure.description);
            }
            Terminal::Finished(description) => self.delegate.fire_test_finished(&description),
        }
    }
}

impl RunNotifier for ParallelRunNotifier<'_> {
    fn fire_test_suite_started(&self, description: &Description) {
        self.delegate.fire_test_suite_started(description);
    }

    fn fire_test_started(&self, description: &Description) {
        let mut state = self.state.lock();
        state.starts.push_back(description.clone());
        self.pump(&mut state);
    }

    fn fire_test_ignored(&self, description: &Description, reason: &str) {
        let mut state = self.state.lock();
        state
            .ignored
            .push_back((description.clone(), reason.to_owned()));
        self.pump(&mut state);
    }

    fn fire_test_failure(&self, failure: &Failure) {
        self.accept_terminal(Terminal::Failure(failure.clone()));
    }

    fn fire_test_assumption_failed(&self, failure: &Failure) {
        self.accept_terminal(Terminal::AssumptionFailed(failure.clone()));
    }

    fn fire_test_finished(&self, description: &Description) {
        self.accept_terminal(Terminal::Finished(description.clone()));
    }

    fn fire_test_suite_finished(&self, description: &Description) {
        let mut state = self.state.lock();
        // A test still in flight now will never report its end.
        loop {
            self.pump(&mut state);
            if state.in_flight.take().is_none() {
                break;
            }
        }
        for terminal in state.terminals.drain(..) {
            self.emit(terminal);
        }
        state.finished.clear();
        self.delegate.fire_test_suite_finished(description);
    }
}
