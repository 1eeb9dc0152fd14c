pub mod mock_counters;
pub mod mock_drivers;

pub use mock_counters::MockCounters;
pub use mock_drivers::{BuildCall, MockBuildDriver, MockRunDriver, RunBehaviour};
