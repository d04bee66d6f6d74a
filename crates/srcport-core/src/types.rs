//! Shared datetime aliases

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used for every TIMESTAMPTZ column.
pub type DBDateTime = ChronoDateTime<Utc>;

/// UTC DateTime used in non-persisted values such as credential expiry.
pub type UtcDateTime = ChronoDateTime<Utc>;
