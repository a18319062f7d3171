pub mod allocator;
pub mod types;

pub use allocator::{assign_by_mode, assign_manual, assign_pilot, record_time, set_closed};
pub use types::{
    qualy_records, AssignError, AssignMode, QualyAssignment, QualyRecord, QualySession,
    SessionStatus,
};
