pub mod error;
pub mod outcome;
pub mod service;

pub use error::AttendanceError;
pub use outcome::{
    ApproveBreakOutcome, BreakRequestOutcome, CheckInOutcome, CheckOutOutcome, EndBreakOutcome,
    Punctuality, ReconcileOutcome, RejectBreakOutcome, WorkSummary,
};
pub use service::AttendanceService;
