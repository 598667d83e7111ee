

use crate::solver::PenaltyBreakdown;
use crate::{Placement, Problem};
use serde_json::json;

/// Read a timetabling problem from the simple JSON representation (canonical serde_json
/// serialization of a `Problem` object).
pub fn read<R: std::io::Read>(reader: R) -> Result<Problem, String> {
    serde_json::from_reader(reader).map_err(|err| err.to_string())
}

/// Write the calculated schedule as simple JSON representation to a Writer (e.g. an output file).
///
/// The schedule is written as a map from section name to its `Placement`, together with the
/// penalty report of the schedule.
pub fn write<W: std::io::Write>(
    writer: W,
    placements: &[Placement],
    problem: &Problem,
    penalty: &PenaltyBreakdown,
) -> Result<(), String> {
    let mut schedule = serde_json::Map::new();
    for (section, placement) in problem.sections.iter().zip(placements) {
        schedule.insert(
            section.name.clone(),
            serde_json::to_value(placement).map_err(|e| format!("{}", e))?,
        );
    }
    let data = json!({
        "format": "X-timetable-simple",
        "version": "1.0",
        "schedule": schedule,
        "penalty": serde_json::to_value(penalty).map_err(|e| format!("{}", e))?,
    });
    serde_json::to_writer(writer, &data).map_err(|e| format!("{}", e))?;

    Ok(())
}
