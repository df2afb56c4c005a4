//! Checks and fixes that need all the stop times of a trip at once
use gtfs_structures::{EntityError, StopTime};

/// Fills the missing times between two timed stops of a trip
///
/// The time is spread by `shape_dist_traveled` when every stop of the gap has it, or
/// else evenly by position. Stops before the first or after the last timed stop are
/// left untouched. The stop times must be ordered by `stop_sequence`.
pub fn interpolate(stop_times: &mut [StopTime]) {
    for st in stop_times.iter_mut() {
        match (st.arrival_time, st.departure_time) {
            (None, Some(t)) => st.arrival_time = Some(t),
            (Some(t), None) => st.departure_time = Some(t),
            _ => {}
        }
    }

    let timed: Vec<usize> = stop_times
        .iter()
        .enumerate()
        .filter(|(_, st)| st.arrival_time.is_some())
        .map(|(i, _)| i)
        .collect();

    for pair in timed.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end == start + 1 {
            continue;
        }
        let (Some(from), Some(to)) = (stop_times[start].departure_time, stop_times[end].arrival_time)
        else {
            continue;
        };
        if to < from {
            continue;
        }
        let gap = &mut stop_times[start..=end];
        let distances: Option<Vec<f64>> = gap
            .iter()
            .map(|st| st.shape_dist_traveled.map(f64::from))
            .collect();
        let positions = match distances {
            Some(d) if d[d.len() - 1] > d[0] && d.windows(2).all(|w| w[1] >= w[0]) => d,
            _ => (0..gap.len()).map(|i| i as f64).collect(),
        };
        let first = positions[0];
        let span = positions[positions.len() - 1] - first;
        let duration = f64::from(to - from);
        let last = gap.len() - 1;
        for (st, position) in gap[1..last].iter_mut().zip(&positions[1..last]) {
            let time = from + (duration * (position - first) / span).round() as u32;
            st.arrival_time = Some(time);
            st.departure_time = Some(time);
        }
    }
}

/// Rules on the stop times of a trip taken together
///
/// The stop times must be ordered by `stop_sequence`.
pub fn validate(stop_times: &[StopTime]) -> Vec<EntityError> {
    let mut errors = vec![];
    if let (Some(first), Some(last)) = (stop_times.first(), stop_times.last()) {
        if first.arrival_time.is_none() && first.departure_time.is_none() {
            errors.push(EntityError::ConditionallyRequiredField("arrival_time"));
        }
        if last.arrival_time.is_none() && last.departure_time.is_none() {
            errors.push(EntityError::ConditionallyRequiredField("departure_time"));
        }
    }

    for pair in stop_times.windows(2) {
        if pair[1].stop_sequence <= pair[0].stop_sequence {
            errors.push(EntityError::invalid_field(
                "stop_sequence",
                pair[1].stop_sequence,
                "must increase along the trip",
            ));
        }
    }

    let mut previous: Option<u32> = None;
    for st in stop_times {
        let arrival = st.arrival_time.or(st.departure_time);
        if let (Some(previous), Some(arrival)) = (previous, arrival) {
            if arrival < previous {
                errors.push(EntityError::invalid_field(
                    "arrival_time",
                    arrival,
                    format!(
                        "stop {} is reached before the previous stop is left",
                        st.stop_sequence
                    ),
                ));
            }
        }
        previous = st.departure_time.or(st.arrival_time).or(previous);
    }
    errors
}
