pub mod draft;
pub mod event;
pub mod schedule;

pub use draft::{CourseDraft, DateMode};
pub use event::{Event, EventPatch, NewEvent};
pub use schedule::Schedule;
