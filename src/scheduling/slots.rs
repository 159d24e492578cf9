use chrono::{Duration, NaiveTime};

pub const DEFAULT_GRANULARITY_MINUTES: i64 = 30;

/// Candidate start times for one staff/date: a fixed grid from opening time,
/// stepping by the granularity, stopping strictly before closing time. The
/// closing time itself is never offered as a start. Existing bookings and
/// closed days are the caller's concern.
pub fn generate_candidates(
    open: NaiveTime,
    close: NaiveTime,
    granularity_minutes: i64,
) -> Vec<NaiveTime> {
    let mut times = Vec::new();
    if granularity_minutes <= 0 {
        return times;
    }

    let step = Duration::minutes(granularity_minutes);
    let mut current = open;
    while current < close {
        times.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            // stepped past midnight
            break;
        }
        current = next;
    }
    times
}
