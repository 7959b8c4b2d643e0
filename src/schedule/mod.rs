pub mod conflicts;
pub mod expand;
pub mod signature;

pub use conflicts::{ConflictQuery, has_conflicts};
pub use expand::{build_events, extract_dates, to_offset_datetime};
pub use signature::draft_signature;
