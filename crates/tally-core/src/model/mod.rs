pub mod id;
pub mod report;
pub mod task;
pub mod timestamp;

pub use id::EntityId;
pub use report::Report;
pub use task::{MemberSummary, Task};
