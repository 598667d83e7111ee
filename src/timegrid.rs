//! The time model: parsing of the textual timeslot descriptions and precomputation of the dense
//! pairwise overlap and gap tables used by all penalty calculations.
//!
//! A timeslot consists of one or more meetings; compound timeslots meeting at different hours on
//! different days are written with their components separated by semicolons, e.g.
//! `7 TR 11:00 am - 12:15 pm ; F 2:00 pm - 2:50 pm`. Times are converted to decimal hours (1:15 pm
//! becomes 13.25) right after parsing, so all later interval arithmetic is plain f64 math.

use chrono::{NaiveTime, Timelike};
use ndarray::Array2;

/// Set of weekdays out of MTWRF, as a five-bit mask
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaySet(u8);

const DAY_LETTERS: [char; 5] = ['M', 'T', 'W', 'R', 'F'];

impl DaySet {
    pub fn parse(token: &str) -> Result<DaySet, String> {
        let mut mask = 0u8;
        for c in token.chars() {
            match DAY_LETTERS.iter().position(|d| *d == c) {
                Some(i) => mask |= 1 << i,
                None => {
                    return Err(format!(
                        "Invalid weekday letter '{}' in day set \"{}\"",
                        c, token
                    ))
                }
            }
        }
        if mask == 0 {
            return Err("Empty day set in timeslot entry".to_owned());
        }
        Ok(DaySet(mask))
    }

    /// Number of weekdays contained in both sets
    pub fn num_shared_days(self, other: DaySet) -> u32 {
        (self.0 & other.0).count_ones()
    }
}

/// A single meeting pattern of a timeslot: one time interval (in decimal hours) taking place on
/// each day of a day set
#[derive(Clone, Debug, PartialEq)]
pub struct Meeting {
    pub days: DaySet,
    pub start: f64,
    pub end: f64,
}

/// One timeslot, identified by its stable id, with one or more meetings
#[derive(Clone, Debug, PartialEq)]
pub struct Timeslot {
    pub id: usize,
    pub meetings: Vec<Meeting>,
}

impl Timeslot {
    /// Parse a timeslot entry of the form
    /// `<id> <DAYS> <h:mm> <am|pm> - <h:mm> <am|pm> [; <component>]*`.
    pub fn parse(entry: &str) -> Result<Timeslot, String> {
        let entry = entry.trim();
        let (id_token, rest) = entry
            .split_once(' ')
            .ok_or_else(|| format!("Timeslot entry \"{}\" has no meeting component", entry))?;
        let id = id_token
            .parse::<usize>()
            .map_err(|e| format!("Invalid timeslot id \"{}\": {}", id_token, e))?;
        let meetings = rest
            .split(';')
            .map(|component| parse_meeting(component.trim()))
            .collect::<Result<Vec<Meeting>, String>>()?;
        Ok(Timeslot { id, meetings })
    }
}

fn parse_meeting(component: &str) -> Result<Meeting, String> {
    let fields: Vec<&str> = component.split_whitespace().collect();
    if fields.len() != 6 || fields[3] != "-" {
        return Err(format!("Malformed meeting component \"{}\"", component));
    }
    let days = DaySet::parse(fields[0])?;
    let start = parse_clock_time(fields[1], fields[2])?;
    let end = parse_clock_time(fields[4], fields[5])?;
    if end <= start {
        return Err(format!(
            "Meeting component \"{}\" ends before it starts",
            component
        ));
    }
    Ok(Meeting { days, start, end })
}

/// Convert a 12-hour clock time (e.g. "1:15" + "pm") to decimal hours (13.25)
fn parse_clock_time(hhmm: &str, ampm: &str) -> Result<f64, String> {
    let time = NaiveTime::parse_from_str(&format!("{} {}", hhmm, ampm), "%I:%M %p")
        .map_err(|e| format!("Invalid meeting time \"{} {}\": {}", hhmm, ampm, e))?;
    Ok(time.hour() as f64 + time.minute() as f64 / 60.0)
}

/// Precomputed pairwise overlap and gap tables over all timeslots, indexed by timeslot id.
///
/// Both relations are total and symmetric. The "unplaced" sentinel timeslot is not part of the
/// tables; callers treat it as overlapping nothing and having gap 0 with everything, which the
/// incremental bookkeeping realizes by simply skipping all updates for unplaced sections.
pub struct TimeGrid {
    overlap: Array2<bool>,
    gap: Array2<f64>,
}

impl TimeGrid {
    /// Build the tables from the parsed timeslot list. The timeslot ids must form the contiguous
    /// range `0..timeslots.len()` (in any order), so they can directly index the tables.
    pub fn build(timeslots: &[Timeslot], max_ignored_gap_width: f64) -> Result<TimeGrid, String> {
        let n = timeslots.len();
        let mut seen = vec![false; n];
        for slot in timeslots {
            if slot.id >= n {
                return Err(format!(
                    "Timeslot id {} is out of range for {} timeslots",
                    slot.id, n
                ));
            }
            if seen[slot.id] {
                return Err(format!("Duplicate timeslot id {}", slot.id));
            }
            seen[slot.id] = true;
        }

        let mut overlap = Array2::from_elem([n, n], false);
        let mut gap = Array2::zeros([n, n]);
        for a in timeslots {
            for b in timeslots {
                let (o, g) = compare_timeslots(a, b, max_ignored_gap_width);
                overlap[[a.id, b.id]] = o;
                gap[[a.id, b.id]] = g;
            }
        }
        Ok(TimeGrid { overlap, gap })
    }

    pub fn num_timeslots(&self) -> usize {
        self.overlap.dim().0
    }

    /// Whether the two timeslots share at least one day with intersecting meeting intervals
    pub fn overlaps(&self, a: usize, b: usize) -> bool {
        self.overlap[[a, b]]
    }

    /// Summed positive time distance between the two timeslots' meetings on shared days, in whole
    /// hours. 0 if the timeslots overlap.
    pub fn gap(&self, a: usize, b: usize) -> f64 {
        self.gap[[a, b]]
    }
}

/// Compare all meeting pairs of two timeslots.
///
/// Overlap is a binary property, ORed over the meeting pairs (closed-interval test). The gap adds,
/// per meeting pair and per shared day, the distance between the two intervals; distances up to
/// `max_ignored_gap_width` hours are treated as adjacent and contribute nothing. An overlapping
/// timeslot pair has gap 0, regardless of its other meeting pairs. The summed gap is rounded to
/// whole hours (ties to even), which also keeps all derived penalty values integral.
fn compare_timeslots(a: &Timeslot, b: &Timeslot, max_ignored_gap_width: f64) -> (bool, f64) {
    let mut overlap_exists = false;
    let mut total_gap = 0.0;
    for meeting_a in &a.meetings {
        for meeting_b in &b.meetings {
            let shared_days = meeting_a.days.num_shared_days(meeting_b.days);
            if shared_days == 0 {
                continue;
            }
            if meeting_a.start <= meeting_b.end && meeting_b.start <= meeting_a.end {
                overlap_exists = true;
            } else {
                let distance = (meeting_b.start - meeting_a.end).max(meeting_a.start - meeting_b.end);
                if distance > max_ignored_gap_width {
                    total_gap += distance * shared_days as f64;
                }
            }
        }
    }
    if overlap_exists {
        (true, 0.0)
    } else {
        (false, round_half_to_even(total_gap))
    }
}

/// Round to the nearest whole number, with exact halves going to the even neighbor. Quarter-hour
/// meeting times produce exact half-integer gap sums, so the tie-breaking direction matters.
fn round_half_to_even(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor == 0.5 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        value.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::assert_float_absolute_eq;

    fn build_grid(entries: &[&str]) -> TimeGrid {
        let timeslots: Vec<Timeslot> = entries
            .iter()
            .map(|e| Timeslot::parse(e).unwrap())
            .collect();
        TimeGrid::build(&timeslots, 2.0).unwrap()
    }

    #[test]
    fn test_parse_timeslot() {
        let slot = Timeslot::parse("3 TR 11:00 am - 12:15 pm").unwrap();
        assert_eq!(slot.id, 3);
        assert_eq!(slot.meetings.len(), 1);
        assert_float_absolute_eq!(slot.meetings[0].start, 11.0, 1e-9);
        assert_float_absolute_eq!(slot.meetings[0].end, 12.25, 1e-9);

        let slot = Timeslot::parse("7 MWF 1:15 pm - 2:05 pm ; R 8:00 am - 9:40 am").unwrap();
        assert_eq!(slot.meetings.len(), 2);
        assert_float_absolute_eq!(slot.meetings[0].start, 13.25, 1e-9);
        assert_float_absolute_eq!(slot.meetings[1].end, 9.0 + 40.0 / 60.0, 1e-9);

        // noon and midnight are the nasty cases of the 12-hour clock
        let slot = Timeslot::parse("0 F 12:00 pm - 12:50 pm").unwrap();
        assert_float_absolute_eq!(slot.meetings[0].start, 12.0, 1e-9);
        let slot = Timeslot::parse("0 F 12:05 am - 1:00 am").unwrap();
        assert_float_absolute_eq!(slot.meetings[0].start, 5.0 / 60.0, 1e-9);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Timeslot::parse("MWF 9:00 am - 9:50 am").is_err());
        assert!(Timeslot::parse("0 XYZ 9:00 am - 9:50 am").is_err());
        assert!(Timeslot::parse("0 MWF 9:00 am 9:50 am").is_err());
        // end before start
        assert!(Timeslot::parse("0 MWF 10:00 am - 9:50 am").is_err());
    }

    #[test]
    fn test_build_rejects_bad_ids() {
        let slots = vec![
            Timeslot::parse("0 M 9:00 am - 9:50 am").unwrap(),
            Timeslot::parse("2 T 9:00 am - 9:50 am").unwrap(),
        ];
        assert!(TimeGrid::build(&slots, 2.0).is_err());
        let slots = vec![
            Timeslot::parse("0 M 9:00 am - 9:50 am").unwrap(),
            Timeslot::parse("0 T 9:00 am - 9:50 am").unwrap(),
        ];
        assert!(TimeGrid::build(&slots, 2.0).is_err());
    }

    #[test]
    fn test_overlap() {
        let grid = build_grid(&[
            "0 MWF 9:00 am - 9:50 am",
            "1 MWF 10:00 am - 10:50 am",
            "2 TR 9:00 am - 10:15 am",
            "3 WF 9:30 am - 10:45 am",
        ]);
        assert!(grid.overlaps(0, 0));
        assert!(!grid.overlaps(0, 1));
        // disjoint days
        assert!(!grid.overlaps(0, 2));
        // shared W day, intersecting intervals
        assert!(grid.overlaps(0, 3));
        assert!(grid.overlaps(1, 3));

        for a in 0..grid.num_timeslots() {
            for b in 0..grid.num_timeslots() {
                assert_eq!(grid.overlaps(a, b), grid.overlaps(b, a));
            }
        }
    }

    #[test]
    fn test_gap() {
        let grid = build_grid(&[
            "0 MWF 9:00 am - 9:45 am",
            "1 MWF 10:00 am - 10:45 am",
            "2 MWF 1:00 pm - 1:45 pm",
            "3 TR 9:00 am - 10:15 am",
            "4 M 2:00 pm - 2:45 pm",
        ]);
        // 15 minutes apart, clipped to zero
        assert_float_absolute_eq!(grid.gap(0, 1), 0.0, 1e-9);
        // 9:45 to 13:00 is 3.25 hours on each of three shared days, rounded to 10
        assert_float_absolute_eq!(grid.gap(0, 2), 10.0, 1e-9);
        // no shared days
        assert_float_absolute_eq!(grid.gap(0, 3), 0.0, 1e-9);
        // single shared day: 9:45 to 14:00 is 4.25 hours, once
        assert_float_absolute_eq!(grid.gap(0, 4), 4.0, 1e-9);
        // overlapping slots have gap 0
        assert_float_absolute_eq!(grid.gap(0, 0), 0.0, 1e-9);

        for a in 0..grid.num_timeslots() {
            for b in 0..grid.num_timeslots() {
                assert_float_absolute_eq!(grid.gap(a, b), grid.gap(b, a), 1e-9);
            }
        }
    }

    #[test]
    fn test_gap_rounds_half_to_even() {
        let grid = build_grid(&[
            "0 M 9:00 am - 11:30 am",
            "1 M 2:00 pm - 2:30 pm",
            "2 M 9:00 am - 10:30 am",
        ]);
        // 11:30 to 14:00 is an exact 2.5 hours on one shared day: ties go to the even neighbor,
        // so this rounds down to 2, not up to 3
        assert_float_absolute_eq!(grid.gap(0, 1), 2.0, 1e-9);
        // 10:30 to 14:00 is 3.5 hours, which rounds up to the even 4
        assert_float_absolute_eq!(grid.gap(2, 1), 4.0, 1e-9);
    }

    #[test]
    fn test_overlap_forces_zero_gap() {
        // The two timeslots overlap on Monday, so the large Friday gap must not be counted.
        let grid = build_grid(&[
            "0 M 9:00 am - 9:50 am ; F 8:00 am - 8:50 am",
            "1 M 9:30 am - 10:20 am ; F 2:00 pm - 2:50 pm",
        ]);
        assert!(grid.overlaps(0, 1));
        assert_float_absolute_eq!(grid.gap(0, 1), 0.0, 1e-9);
    }
}
