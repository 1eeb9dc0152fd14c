use pacbench_harness::counters::{CounterId, CounterSnapshot, CounterSource};
use pacbench_harness::error::CounterResult;
use std::sync::{Arc, Mutex};

/// In-memory PAC/AUT counters shared between a run driver and the suite.
///
/// Clones share state, so one handle can be boxed into the suite while the
/// run driver bumps another.
#[derive(Clone, Default)]
pub struct MockCounters {
    state: Arc<Mutex<CounterSnapshot>>,
}

impl MockCounters {
    pub fn new(pac: u64, aut: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(CounterSnapshot { pac, aut })),
        }
    }

    pub fn add(&self, pac: u64, aut: u64) {
        let mut state = self.state.lock().unwrap();
        state.pac += pac;
        state.aut += aut;
    }

    /// Simulate an external reset of both counters
    pub fn reset(&self) {
        *self.state.lock().unwrap() = CounterSnapshot::default();
    }

    pub fn current(&self) -> CounterSnapshot {
        *self.state.lock().unwrap()
    }
}

impl CounterSource for MockCounters {
    fn read(&self, counter: CounterId) -> CounterResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(match counter {
            CounterId::Pac => state.pac,
            CounterId::Aut => state.aut,
        })
    }
}
