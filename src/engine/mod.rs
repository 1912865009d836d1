mod availability;
mod capacity;
mod error;
mod mutations;
mod recurrence;
mod staging;
mod store;

pub use availability::{select_view, Aggregator, AvailabilityView, MemberHistory, OccurrenceCounts};
pub use capacity::{line_responders, required_responders};
pub use error::EngineError;
pub use mutations::{CommitFailure, CommitReport};
pub use recurrence::generate;
pub use staging::{StagedChange, StagingSession};
pub use store::{InMemoryStore, RecordStore, StoreError};
