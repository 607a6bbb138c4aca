//! SEAMS Core - domain rules for the campus Student Engagement & Activity
//! Management System.
//!
//! This crate holds everything about SEAMS that does not touch the network or
//! a database:
//!
//! - Roles and what each may do
//! - The event review workflow and field rules
//! - Registration state rules and seat accounting
//! - Idempotent credit posting keys
//! - Signed, time-boxed attendance tokens (what an event's QR code encodes)
//! - QR image rendering (`qr-image` feature)
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use seams_core::{AttendanceSigner, SeamsError};
//! use uuid::Uuid;
//!
//! # fn example() -> seams_core::Result<()> {
//! let signer = AttendanceSigner::new(AttendanceSigner::generate_key())?;
//! let event_id = Uuid::new_v4();
//!
//! let issued = signer.issue(event_id, Duration::hours(1), Utc::now())?;
//! let claims = signer.verify(&issued.token, Utc::now())?;
//! assert_eq!(claims.event_id, event_id);
//!
//! // An hour later the same QR code no longer works
//! let later = Utc::now() + Duration::hours(2);
//! assert_eq!(signer.verify(&issued.token, later), Err(SeamsError::QrExpired));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod credit;
pub mod error;
pub mod event;
#[cfg(feature = "qr-image")]
pub mod qr;
pub mod registration;
pub mod role;
pub mod token;

pub use credit::{attendance_key, total_points, CreditAward};
pub use error::{Result, SeamsError, CURRENT_TOKEN_VERSION, MAX_TOKEN_LEN};
pub use event::{
    check_capacity, validate_date_range, EventCategory, EventDraft, EventPatch, EventStatus,
    MAX_EVENT_POINTS,
};
pub use registration::RegistrationStatus;
pub use role::Role;
pub use token::{decode_unverified, AttendanceClaims, AttendanceSigner, IssuedToken, MIN_KEY_LEN};

#[cfg(feature = "qr-image")]
pub use qr::{render_png, render_png_data_url};
