//! The local-search improver: reassign single sections to a strictly cheaper (timeslot, room)
//! while one exists.

use log::debug;

use super::state::SlotState;
use super::{score, Color, Instance, PartialSchedule, Statistics};

/// One improvement pass.
///
/// All placed sections are visited in order of their current weighted penalty, highest first
/// (ties by vertex index). For each section, every acceptable timeslot with an open room is
/// evaluated; if one is strictly cheaper than the section's current timeslot, the section is moved
/// there (into the first open room in declared order) and the comparison baseline is updated, so
/// later candidates must beat the new placement. Strict comparison rules out thrashing between
/// equal placements, and since conflict and proximity penalties are symmetric between the two
/// endpoints of an edge, every accepted move also lowers the total penalty of the schedule.
///
/// Sections placed without a room are skipped: their recorded penalty is 0, so no strictly
/// cheaper timeslot can exist for them.
pub(super) fn improve_pass(
    instance: &Instance,
    slot_state: &mut SlotState,
    schedule: &mut PartialSchedule,
    statistics: &mut Statistics,
) {
    let mut order: Vec<(f64, usize)> = schedule
        .iter()
        .enumerate()
        .filter_map(|(vertex, color)| {
            color.as_ref().map(|c| {
                (
                    score::placed_vertex_penalty(instance, slot_state, vertex, c.timeslot),
                    vertex,
                )
            })
        })
        .collect();
    order.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, vertex) in order {
        let mut assigned = match &schedule[vertex] {
            Some(color) => *color,
            None => continue,
        };
        if assigned.timeslot.is_none() {
            continue;
        }
        let mut current_penalty =
            score::placed_vertex_penalty(instance, slot_state, vertex, assigned.timeslot);

        for &t in &instance.sections[vertex].timeslots {
            let room_index = match slot_state.open_rooms(vertex, t).next() {
                Some(i) => i,
                None => continue,
            };
            let candidate_penalty =
                score::placed_vertex_penalty(instance, slot_state, vertex, Some(t));
            if candidate_penalty < current_penalty {
                let new_color = Color {
                    timeslot: Some(t),
                    room: Some(instance.sections[vertex].rooms[room_index]),
                };
                debug!(
                    "Moving {} from timeslot {:?} to timeslot {} (penalty {} -> {})",
                    instance.sections[vertex].name,
                    assigned.timeslot,
                    t,
                    current_penalty,
                    candidate_penalty
                );
                slot_state.unassign(instance, vertex, &assigned);
                slot_state.assign(instance, vertex, &new_color);
                schedule[vertex] = Some(new_color);
                assigned = new_color;
                current_penalty = candidate_penalty;
                statistics.improver_moves += 1;
            }
        }
    }
}
