use crate::model::{Booking, NewBooking};

/// First live booking the candidate would clash with.
///
/// Clash: same room, same date, and `b.start < c.end && b.end > c.start`.
/// Touching windows (`b.end == c.start`) are legal.
pub(crate) fn find_clash<'a>(existing: &'a [Booking], candidate: &NewBooking) -> Option<&'a Booking> {
    let window = candidate.window();
    existing
        .iter()
        .filter(|b| b.room == candidate.room && b.date == candidate.date)
        .find(|b| b.window().overlaps(&window))
}
