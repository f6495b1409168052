use serde::{Deserialize, Serialize};

use crate::limits::MAX_FIELD_LEN;

/// Monotonically assigned booking identifier.
pub type BookingId = u64;

/// Half-open time-of-day window `[start, end)`.
///
/// Bounds are zero-padded `HH:MM` strings, so lexical order is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

impl<'a> Window<'a> {
    pub fn new(start: &'a str, end: &'a str) -> Self {
        debug_assert!(start < end, "Window start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Window<'_>) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Admission serializes on this pair; clashes only exist within one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub room: String,
    pub date: String,
}

impl SlotKey {
    pub fn new(room: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            date: date.into(),
        }
    }
}

/// A validated candidate that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub room: String,
    pub title: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub booked_by: String,
}

impl NewBooking {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.room.clone(), self.date.clone())
    }

    pub fn window(&self) -> Window<'_> {
        Window::new(&self.start, &self.end)
    }

    pub fn with_id(self, id: BookingId) -> Booking {
        Booking {
            id,
            room: self.room,
            title: self.title,
            date: self.date,
            start: self.start,
            end: self.end,
            booked_by: self.booked_by,
        }
    }
}

/// A live reservation. Immutable once admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room: String,
    pub title: String,
    pub date: String,
    pub start: String,
    pub end: String,
    #[serde(rename = "bookedBy")]
    pub booked_by: String,
}

impl Booking {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.room.clone(), self.date.clone())
    }

    pub fn window(&self) -> Window<'_> {
        Window::new(&self.start, &self.end)
    }

    /// Sort key for listings: `(date, start)`, ties by insertion order.
    pub fn listing_key(&self) -> (&str, &str, BookingId) {
        (&self.date, &self.start, self.id)
    }
}

/// Raw booking request as it arrives from a caller. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookingRequest {
    pub room: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "bookedBy")]
    pub booked_by: Option<String>,
}

/// Why a request could not be turned into a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    MissingField(&'static str),
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    InvalidWindow {
        start: String,
        end: String,
    },
}

impl BookingRequest {
    /// Check presence first (for every field), then shape, then the window.
    pub fn into_candidate(self) -> Result<NewBooking, RequestError> {
        let room = required("room", self.room)?;
        let title = required("title", self.title)?;
        let date = required("date", self.date)?;
        let start = required("start", self.start)?;
        let end = required("end", self.end)?;
        let booked_by = required("bookedBy", self.booked_by)?;

        for (field, value) in [
            ("room", &room),
            ("title", &title),
            ("date", &date),
            ("bookedBy", &booked_by),
        ] {
            if value.len() > MAX_FIELD_LEN {
                return Err(RequestError::InvalidField {
                    field,
                    reason: "too long",
                });
            }
        }
        if !is_calendar_date(&date) {
            return Err(RequestError::InvalidField {
                field: "date",
                reason: "expected YYYY-MM-DD",
            });
        }
        let start = normalize_time(&start).ok_or(RequestError::InvalidField {
            field: "start",
            reason: "expected HH:MM",
        })?;
        let end = normalize_time(&end).ok_or(RequestError::InvalidField {
            field: "end",
            reason: "expected HH:MM",
        })?;
        if start >= end {
            return Err(RequestError::InvalidWindow { start, end });
        }

        Ok(NewBooking {
            room,
            title,
            date,
            start,
            end,
            booked_by,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, RequestError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(RequestError::MissingField(field)),
    }
}

/// `YYYY-MM-DD` shape with plausible month/day. No calendar arithmetic.
fn is_calendar_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    if !(digits(0..4) && digits(5..7) && digits(8..10)) {
        return false;
    }
    let month: u8 = s[5..7].parse().unwrap_or(0);
    let day: u8 = s[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Normalize `H:MM` / `HH:MM` (an optional `:SS` of `00` is dropped) to `HH:MM`.
pub fn normalize_time(s: &str) -> Option<String> {
    let mut parts = s.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    if let Some(seconds) = parts.next()
        && seconds != "00"
    {
        return None;
    }
    if parts.next().is_some() {
        return None;
    }
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let h: u8 = hours.parse().ok()?;
    let m: u8 = minutes.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(format!("{h:02}:{m:02}"))
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingConfirmed { booking: Booking },
    BookingCancelled { id: BookingId },
    /// Written at the head of a compacted log so ids of cancelled
    /// bookings are never handed out again.
    IdWatermark { next_id: BookingId },
}
