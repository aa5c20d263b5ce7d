use thiserror::Error;

use crate::database::models::BreakType;
use crate::store::StoreError;

/// Everything the attendance state machine can refuse to do. Each variant
/// carries a stable machine-readable code so clients can branch without
/// parsing messages; all of these map to 4xx responses and none are worth
/// retrying. Store failures are the one internal case and surface as 500.
#[derive(Debug, Error)]
pub enum AttendanceError {
    // ---------------------------
    // Identity / assignment
    // ---------------------------
    #[error("agent not found")]
    AgentNotFound,

    #[error("agent has no shift assigned")]
    NoShiftAssigned,

    #[error("shift not found")]
    ShiftNotFound,

    // ---------------------------
    // Check-in / check-out
    // ---------------------------
    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("already checked out today")]
    AlreadyCheckedOut,

    #[error("too late to check in ({late_minutes} minutes past the grace window)")]
    TooLateToCheckIn { late_minutes: i64 },

    #[error("no active session")]
    NoActiveSession,

    #[error("cannot check out while on break; end the break first")]
    CannotCheckOutOnBreak,

    #[error("session not found")]
    SessionNotFound,

    #[error("session belongs to another agent")]
    NotYourSession,

    // ---------------------------
    // Breaks
    // ---------------------------
    #[error("session is already on break")]
    AlreadyOnBreak,

    #[error("break policy not found")]
    BreakPolicyNotFound,

    #[error("break shorter than the {min_minutes} minute minimum")]
    BreakTooShort { min_minutes: i32 },

    #[error("break longer than the {max_minutes} minute maximum")]
    BreakTooLong { max_minutes: i32 },

    #[error("daily break limit of {max_breaks} reached")]
    MaxBreaksReached { max_breaks: i32 },

    #[error("break cooldown active for another {remaining_minutes} minutes")]
    BreakCooldownActive { remaining_minutes: i64 },

    #[error("break type {break_type} is not allowed by the shift's policy")]
    BreakTypeNotAllowed { break_type: BreakType },

    #[error("break request not found")]
    BreakRequestNotFound,

    #[error("a break is already in progress")]
    BreakAlreadyActive,

    #[error("break request has not been approved yet")]
    BreakNotApproved,

    #[error("no break in progress")]
    NoActiveBreak,

    #[error("break request is not pending")]
    BreakNotPending,

    #[error("a rejection reason is required")]
    RejectionReasonRequired,

    // ---------------------------
    // Storage
    // ---------------------------
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl AttendanceError {
    /// Stable code string surfaced to clients alongside the HTTP status.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::AgentNotFound => "AGENT_NOT_FOUND",
            AttendanceError::NoShiftAssigned => "NO_SHIFT_ASSIGNED",
            AttendanceError::ShiftNotFound => "SHIFT_NOT_FOUND",
            AttendanceError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            AttendanceError::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            AttendanceError::TooLateToCheckIn { .. } => "TOO_LATE_TO_CHECK_IN",
            AttendanceError::NoActiveSession => "NO_ACTIVE_SESSION",
            AttendanceError::CannotCheckOutOnBreak => "CANNOT_CHECK_OUT_ON_BREAK",
            AttendanceError::SessionNotFound => "SESSION_NOT_FOUND",
            AttendanceError::NotYourSession => "NOT_YOUR_SESSION",
            AttendanceError::AlreadyOnBreak => "ALREADY_ON_BREAK",
            AttendanceError::BreakPolicyNotFound => "BREAK_POLICY_NOT_FOUND",
            AttendanceError::BreakTooShort { .. } => "BREAK_TOO_SHORT",
            AttendanceError::BreakTooLong { .. } => "BREAK_TOO_LONG",
            AttendanceError::MaxBreaksReached { .. } => "MAX_BREAKS_REACHED",
            AttendanceError::BreakCooldownActive { .. } => "BREAK_COOLDOWN_ACTIVE",
            AttendanceError::BreakTypeNotAllowed { .. } => "BREAK_TYPE_NOT_ALLOWED",
            AttendanceError::BreakRequestNotFound => "BREAK_REQUEST_NOT_FOUND",
            AttendanceError::BreakAlreadyActive => "BREAK_ALREADY_ACTIVE",
            AttendanceError::BreakNotApproved => "BREAK_NOT_APPROVED",
            AttendanceError::NoActiveBreak => "NO_ACTIVE_BREAK",
            AttendanceError::BreakNotPending => "BREAK_NOT_PENDING",
            AttendanceError::RejectionReasonRequired => "REJECTION_REASON_REQUIRED",
            AttendanceError::Store(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            AttendanceError::AgentNotFound
            | AttendanceError::ShiftNotFound
            | AttendanceError::SessionNotFound
            | AttendanceError::BreakPolicyNotFound
            | AttendanceError::BreakRequestNotFound => 404,

            AttendanceError::NotYourSession => 403,

            AttendanceError::NoShiftAssigned
            | AttendanceError::BreakTooShort { .. }
            | AttendanceError::BreakTooLong { .. }
            | AttendanceError::BreakTypeNotAllowed { .. }
            | AttendanceError::RejectionReasonRequired => 422,

            AttendanceError::AlreadyCheckedIn
            | AttendanceError::AlreadyCheckedOut
            | AttendanceError::TooLateToCheckIn { .. }
            | AttendanceError::NoActiveSession
            | AttendanceError::CannotCheckOutOnBreak
            | AttendanceError::AlreadyOnBreak
            | AttendanceError::MaxBreaksReached { .. }
            | AttendanceError::BreakCooldownActive { .. }
            | AttendanceError::BreakAlreadyActive
            | AttendanceError::BreakNotApproved
            | AttendanceError::NoActiveBreak
            | AttendanceError::BreakNotPending => 409,

            AttendanceError::Store(_) => 500,
        }
    }
}
