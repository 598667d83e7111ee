//! The penalty model and the selection heuristics of the solver: total-penalty evaluation, the
//! "bad value of colors" urgency measure, the good-to-bad switch look-ahead and the combined
//! color-and-room selection.

use std::fmt;

use serde::Serialize;

use super::state::SlotState;
use super::{Color, Instance, PartialSchedule};
use crate::Severity;

pub(crate) const INSTRUCTOR_CONFLICT_PENALTY: f64 = 400.0;
pub(crate) const HEAVY_CONFLICT_PENALTY: f64 = 400.0;
pub(crate) const MEDIUM_CONFLICT_PENALTY: f64 = 20.0;
pub(crate) const LIGHT_CONFLICT_PENALTY: f64 = 1.0;

/// Urgency boost for vertices with a single acceptable timeslot, so they are colored before
/// anything with options
const SINGLE_TIMESLOT_URGENCY: f64 = 10000.0;
/// Badness of a candidate timeslot without any open room left
const ROOMLESS_URGENCY: f64 = 10.0;
/// Badness of a roomless candidate timeslot of a lab section
const ROOMLESS_LAB_URGENCY: f64 = 5000.0;

pub(crate) fn severity_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Instructor => INSTRUCTOR_CONFLICT_PENALTY,
        Severity::Heavy => HEAVY_CONFLICT_PENALTY,
        Severity::Medium => MEDIUM_CONFLICT_PENALTY,
        Severity::Light => LIGHT_CONFLICT_PENALTY,
    }
}

/// Weighted penalty report of a (possibly partial) schedule.
///
/// Conflict and proximity contributions are counted once per conflicting pair of placed sections;
/// every placed section without a room adds the unassigned-room penalty.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PenaltyBreakdown {
    /// Weighted conflict penalty over all placed section pairs
    pub conflict: f64,
    /// Weighted proximity penalty over all placed section pairs
    pub proximity: f64,
    /// Penalty for sections without a room
    pub room: f64,
    pub num_instructor_conflicts: u32,
    pub num_heavy_conflicts: u32,
    pub num_medium_conflicts: u32,
    pub num_light_conflicts: u32,
    /// Number of sections placed without timeslot and room
    pub num_unplaced: u32,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f64 {
        self.conflict + self.proximity + self.room
    }
}

impl fmt::Display for PenaltyBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Weighted conflict penalty:  {: >10.1}
Weighted proximity penalty: {: >10.1}
Unassigned room penalty:    {: >10.1}
----------------------------------------
Total penalty:              {: >10.1}

Instructor conflicts: {: >4}
Heavy conflicts:      {: >4}
Medium conflicts:     {: >4}
Light conflicts:      {: >4}
Sections without room:{: >4}\n",
            self.conflict,
            self.proximity,
            self.room,
            self.total(),
            self.num_instructor_conflicts,
            self.num_heavy_conflicts,
            self.num_medium_conflicts,
            self.num_light_conflicts,
            self.num_unplaced,
        )
    }
}

/// Evaluate the total penalty of a schedule from scratch, by walking the conflict edges of all
/// placed sections. This is deliberately independent of the incremental slot-state, so it can
/// double-check the bookkeeping in tests.
pub(crate) fn total_penalty(instance: &Instance, schedule: &PartialSchedule) -> PenaltyBreakdown {
    let config = &instance.config;
    let mut breakdown = PenaltyBreakdown::default();
    let mut conflict = 0.0;
    let mut proximity = 0.0;

    for (v, color) in schedule.iter().enumerate() {
        let color = match color {
            Some(color) => color,
            None => continue,
        };
        let slot_v = match color.timeslot {
            Some(t) => t,
            None => {
                breakdown.num_unplaced += 1;
                continue;
            }
        };
        for (u, edge) in instance.graph.neighbors(v) {
            // Count each edge from its lower endpoint only
            if u <= v {
                continue;
            }
            let slot_u = match &schedule[u] {
                Some(Color {
                    timeslot: Some(t), ..
                }) => *t,
                _ => continue,
            };
            if instance.grid.overlaps(slot_v, slot_u) {
                conflict += severity_penalty(edge.severity);
                match edge.severity {
                    Severity::Instructor => breakdown.num_instructor_conflicts += 1,
                    Severity::Heavy => breakdown.num_heavy_conflicts += 1,
                    Severity::Medium => breakdown.num_medium_conflicts += 1,
                    Severity::Light => breakdown.num_light_conflicts += 1,
                }
            }
            proximity += instance.grid.gap(slot_v, slot_u) * edge.overlap as f64;
        }
    }

    breakdown.conflict = config.conflict_penalty_weight * conflict;
    breakdown.proximity = config.proximity_penalty_weight * proximity;
    breakdown.room = breakdown.num_unplaced as f64 * config.unassigned_room_penalty;
    breakdown
}

/// Weighted penalty currently recorded for a placed vertex at its assigned timeslot (0 for the
/// sentinel placement)
pub(crate) fn placed_vertex_penalty(
    instance: &Instance,
    slot_state: &SlotState,
    vertex: usize,
    timeslot: Option<usize>,
) -> f64 {
    match timeslot {
        Some(t) => {
            instance.config.conflict_penalty_weight * slot_state.conflict(vertex, t)
                + instance.config.proximity_penalty_weight * slot_state.proximity(vertex, t)
        }
        None => 0.0,
    }
}

/// The "bad value of colors" of an uncolored vertex: the number of its candidate timeslots whose
/// penalties exceed the thresholds, counting fractional badness below the threshold and extra
/// badness for timeslots without open rooms. Vertices with a single acceptable timeslot get a
/// large boost so they are scheduled early.
pub(crate) fn bad_value_of_colors(
    instance: &Instance,
    slot_state: &SlotState,
    vertex: usize,
) -> f64 {
    let config = &instance.config;
    let section = &instance.sections[vertex];
    let mut bad_value = 0.0;

    if section.timeslots.len() == 1 {
        bad_value += SINGLE_TIMESLOT_URGENCY;
    }

    for &t in &section.timeslots {
        let conflict = slot_state.conflict(vertex, t);
        if conflict > config.conflict_penalty_threshold {
            bad_value += 1.0;
        } else {
            bad_value += conflict / config.conflict_penalty_threshold;
        }

        let proximity = slot_state.proximity(vertex, t);
        if proximity > config.proximity_penalty_threshold {
            bad_value += 1.0;
        } else {
            bad_value += proximity / config.proximity_penalty_threshold;
        }

        let num_open_rooms = slot_state.num_open_rooms(vertex, t);
        if num_open_rooms == 0 {
            bad_value += if section.is_lab {
                ROOMLESS_LAB_URGENCY
            } else {
                ROOMLESS_URGENCY
            };
        } else {
            bad_value += (2.0f64).powi(-2 * num_open_rooms as i32);
        }
    }

    bad_value
}

/// The uncolored vertex with the largest bad value of colors; the first one in input order wins
/// ties. `None` if all vertices are colored.
pub(crate) fn most_troublesome_vertex(
    instance: &Instance,
    slot_state: &SlotState,
    schedule: &PartialSchedule,
) -> Option<usize> {
    let mut max_bad_value = -1.0;
    let mut most_troublesome = None;
    for vertex in 0..schedule.len() {
        if schedule[vertex].is_some() {
            continue;
        }
        let bad_value = bad_value_of_colors(instance, slot_state, vertex);
        if bad_value > max_bad_value {
            max_bad_value = bad_value;
            most_troublesome = Some(vertex);
        }
    }
    most_troublesome
}

/// The `n` uncolored vertices with the largest bad value of colors, in descending order (ties by
/// vertex index)
pub(crate) fn most_troublesome_vertices(
    instance: &Instance,
    slot_state: &SlotState,
    schedule: &PartialSchedule,
    n: usize,
) -> Vec<usize> {
    let mut ranked: Vec<(f64, usize)> = (0..schedule.len())
        .filter(|v| schedule[*v].is_none())
        .map(|v| (bad_value_of_colors(instance, slot_state, v), v))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.truncate(n);
    ranked.into_iter().map(|(_, v)| v).collect()
}

/// Count the neighbor timeslots that would switch from "good" to "bad" if the given (timeslot,
/// room) were assigned to the vertex: either penalty newly crossing its threshold, or another
/// vertex losing the last open room of one of its candidate timeslots.
pub(crate) fn good_to_bad_switch(
    instance: &Instance,
    slot_state: &SlotState,
    vertex: usize,
    timeslot: usize,
    room: usize,
) -> u32 {
    let config = &instance.config;
    let mut switched = 0;

    for (u, edge) in instance.graph.neighbors(vertex) {
        for &t in &instance.sections[u].timeslots {
            if instance.grid.overlaps(timeslot, t) {
                let conflict = slot_state.conflict(u, t);
                if conflict <= config.conflict_penalty_threshold
                    && conflict + severity_penalty(edge.severity)
                        > config.conflict_penalty_threshold
                {
                    switched += 1;
                }
            }
            // An overlapping timeslot has gap 0 and can never switch on proximity
            let proximity = slot_state.proximity(u, t);
            let increase = instance.grid.gap(timeslot, t) * edge.overlap as f64;
            if proximity <= config.proximity_penalty_threshold
                && proximity + increase > config.proximity_penalty_threshold
            {
                switched += 1;
            }
        }
    }

    for (w, section) in instance.sections.iter().enumerate() {
        if w == vertex {
            continue;
        }
        let i = match section.rooms.iter().position(|&r| r == room) {
            Some(i) => i,
            None => continue,
        };
        for &t in &section.timeslots {
            if instance.grid.overlaps(timeslot, t)
                && slot_state.num_open_rooms(w, t) == 1
                && slot_state.room_is_open(w, t, i)
            {
                switched += 1;
            }
        }
    }

    switched
}

/// A candidate color for a vertex together with its linear-combination score
#[derive(Clone, Debug)]
pub(crate) struct ColorChoice {
    pub score: f64,
    pub color: Color,
}

/// Select candidate (timeslot, room) choices for the vertex.
///
/// Every acceptable timeslot with at least one open room is scored per open room by the linear
/// combination of conflict penalty, proximity penalty and good-to-bad switch count. With
/// `num_candidates` 1, the single global minimizer is returned (ties: earliest timeslot, then
/// earliest room, in declared order). Otherwise the best room is chosen per timeslot and the
/// `num_candidates` lowest-scoring timeslots are returned, ordered by (score, timeslot id).
///
/// If no acceptable timeslot has an open room, the single sentinel choice `(None, None)` is
/// returned; the result is never empty.
pub(crate) fn select_colors(
    instance: &Instance,
    slot_state: &SlotState,
    vertex: usize,
    num_candidates: usize,
) -> Vec<ColorChoice> {
    let config = &instance.config;
    let section = &instance.sections[vertex];

    let mut best: Option<ColorChoice> = None;
    // Best (score, room) per timeslot, for the multi-candidate case
    let mut per_timeslot: Vec<(f64, usize, usize)> = Vec::new();

    for &t in &section.timeslots {
        let open_rooms: Vec<usize> = slot_state.open_rooms(vertex, t).collect();
        if open_rooms.is_empty() {
            continue;
        }
        let base = config.combo_conflict_weight * slot_state.conflict(vertex, t)
            + config.combo_proximity_weight * slot_state.proximity(vertex, t);

        let mut slot_best: Option<(f64, usize)> = None;
        for i in open_rooms {
            let room = section.rooms[i];
            let switch = good_to_bad_switch(instance, slot_state, vertex, t, room);
            let score = base + config.combo_switch_weight * switch as f64;
            if best.as_ref().map_or(true, |b| score < b.score) {
                best = Some(ColorChoice {
                    score,
                    color: Color {
                        timeslot: Some(t),
                        room: Some(room),
                    },
                });
            }
            if slot_best.map_or(true, |(s, _)| score < s) {
                slot_best = Some((score, room));
            }
        }
        if let Some((score, room)) = slot_best {
            per_timeslot.push((score, t, room));
        }
    }

    let sentinel = ColorChoice {
        score: 0.0,
        color: Color {
            timeslot: None,
            room: None,
        },
    };
    if num_candidates <= 1 {
        vec![best.unwrap_or(sentinel)]
    } else if per_timeslot.is_empty() {
        vec![sentinel]
    } else {
        per_timeslot.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        per_timeslot.truncate(num_candidates);
        per_timeslot
            .into_iter()
            .map(|(score, t, room)| ColorChoice {
                score,
                color: Color {
                    timeslot: Some(t),
                    room: Some(room),
                },
            })
            .collect()
    }
}

/// Aggregated heuristics over the uncolored part of a partial schedule, as input to the beam
/// search priority score. Edges between uncolored vertices are counted from both endpoints.
pub(crate) struct UncoloredAggregates {
    pub total_bad_value: f64,
    pub total_edge_weight: f64,
    pub num_edges: u32,
    pub bad_value_of_edges: f64,
}

pub(crate) fn uncolored_aggregates(
    instance: &Instance,
    slot_state: &SlotState,
    schedule: &PartialSchedule,
) -> UncoloredAggregates {
    let config = &instance.config;
    let mut aggregates = UncoloredAggregates {
        total_bad_value: 0.0,
        total_edge_weight: 0.0,
        num_edges: 0,
        bad_value_of_edges: 0.0,
    };
    for vertex in 0..schedule.len() {
        if schedule[vertex].is_some() {
            continue;
        }
        aggregates.total_bad_value += bad_value_of_colors(instance, slot_state, vertex);
        for (u, edge) in instance.graph.neighbors(vertex) {
            if schedule[u].is_some() {
                continue;
            }
            let weight = severity_penalty(edge.severity);
            if weight > config.conflict_penalty_threshold {
                aggregates.bad_value_of_edges += 1.0;
            } else {
                aggregates.bad_value_of_edges += weight / config.conflict_penalty_threshold;
            }
            aggregates.total_edge_weight += weight;
            aggregates.num_edges += 1;
        }
    }
    aggregates
}

#[cfg(test)]
mod tests {
    use super::super::{build_instance, Color, Instance, PartialSchedule, SolverConfig};
    use super::*;
    use crate::{ConflictDecl, Problem, Section, Severity};
    use assert_float_eq::assert_float_absolute_eq;

    fn make_section(name: &str, timeslots: Vec<usize>, rooms: Vec<&str>) -> Section {
        Section {
            name: name.to_owned(),
            instructor: String::new(),
            timeslots,
            rooms: rooms.into_iter().map(|r| r.to_owned()).collect(),
        }
    }

    fn make_instance() -> Instance {
        let problem = Problem {
            timeslots: vec![
                "0 MWF 9:00 am - 9:45 am".to_owned(),
                "1 MWF 10:00 am - 10:45 am".to_owned(),
                "2 MWF 1:00 pm - 1:45 pm".to_owned(),
            ],
            rooms: vec!["R1".to_owned(), "R2".to_owned()],
            sections: vec![
                make_section("CMS_230_1", vec![0, 1], vec!["R1", "R2"]),
                make_section("MAT_111_1", vec![0, 1], vec!["R1"]),
                make_section("PHY_120_1_LAB", vec![2], vec!["R2"]),
            ],
            conflicts: vec![ConflictDecl {
                first: "CMS_230_1".to_owned(),
                second: "MAT_111_1".to_owned(),
                severity: Severity::Medium,
                overlap: 5,
            }],
        };
        build_instance(&problem, SolverConfig::default()).unwrap()
    }

    #[test]
    fn test_total_penalty_counts_each_edge_once() {
        let instance = make_instance();
        let schedule: PartialSchedule = vec![
            Some(Color {
                timeslot: Some(0),
                room: Some(0),
            }),
            Some(Color {
                timeslot: Some(0),
                room: Some(1),
            }),
            None,
        ];
        let breakdown = total_penalty(&instance, &schedule);
        assert_eq!(breakdown.num_medium_conflicts, 1);
        assert_float_absolute_eq!(breakdown.conflict, 25.0 * MEDIUM_CONFLICT_PENALTY, 1e-9);
        assert_float_absolute_eq!(breakdown.proximity, 0.0, 1e-9);
        assert_eq!(breakdown.num_unplaced, 0);
    }

    #[test]
    fn test_total_penalty_proximity_and_unplaced() {
        let instance = make_instance();
        // Timeslots 0 and 2 have a rounded gap of 3 * 3.25h = 10 hours
        let schedule: PartialSchedule = vec![
            Some(Color {
                timeslot: Some(0),
                room: Some(0),
            }),
            Some(Color {
                timeslot: Some(2),
                room: Some(0),
            }),
            Some(Color {
                timeslot: None,
                room: None,
            }),
        ];
        let breakdown = total_penalty(&instance, &schedule);
        assert_float_absolute_eq!(breakdown.conflict, 0.0, 1e-9);
        assert_float_absolute_eq!(breakdown.proximity, 10.0 * 5.0, 1e-9);
        assert_eq!(breakdown.num_unplaced, 1);
        assert_float_absolute_eq!(breakdown.room, 1000.0, 1e-9);
        assert_float_absolute_eq!(breakdown.total(), 50.0 + 1000.0, 1e-9);
    }

    #[test]
    fn test_bad_value_of_colors() {
        let instance = make_instance();
        let slot_state = super::super::state::SlotState::new(&instance);

        // Two candidate timeslots, no penalties yet, two open rooms each
        let bad_value = bad_value_of_colors(&instance, &slot_state, 0);
        assert_float_absolute_eq!(bad_value, 2.0 * (2.0f64).powi(-4), 1e-9);

        // The lab has a single candidate timeslot and gets the urgency boost
        let bad_value = bad_value_of_colors(&instance, &slot_state, 2);
        assert_float_absolute_eq!(bad_value, 10000.0 + (2.0f64).powi(-2), 1e-9);
    }

    #[test]
    fn test_bad_value_reacts_to_conflicts_and_rooms() {
        let instance = make_instance();
        let mut slot_state = super::super::state::SlotState::new(&instance);
        // Place MAT_111_1 at (0, R1): CMS_230_1 gets a Medium conflict at timeslot 0 and loses R1
        slot_state.assign(
            &instance,
            1,
            &Color {
                timeslot: Some(0),
                room: Some(0),
            },
        );

        // Timeslot 0: conflict 20 over threshold counts 1, one open room left counts 2^-2;
        // timeslot 1: untouched, two open rooms
        let bad_value = bad_value_of_colors(&instance, &slot_state, 0);
        assert_float_absolute_eq!(
            bad_value,
            1.0 + (2.0f64).powi(-2) + (2.0f64).powi(-4),
            1e-9
        );
    }

    #[test]
    fn test_good_to_bad_switch() {
        let instance = make_instance();
        let slot_state = super::super::state::SlotState::new(&instance);

        // Placing CMS_230_1 at (0, R1): MAT_111_1's timeslot 0 would cross the conflict
        // threshold (0 + 20 > 15) and lose its only room.
        let switched = good_to_bad_switch(&instance, &slot_state, 0, 0, 0);
        assert_eq!(switched, 2);

        // With R2 instead, MAT_111_1 keeps R1; only the conflict switch remains.
        let switched = good_to_bad_switch(&instance, &slot_state, 0, 0, 1);
        assert_eq!(switched, 1);
    }

    #[test]
    fn test_select_colors() {
        let instance = make_instance();
        let mut slot_state = super::super::state::SlotState::new(&instance);
        slot_state.assign(
            &instance,
            1,
            &Color {
                timeslot: Some(0),
                room: Some(0),
            },
        );

        // For CMS_230_1, timeslot 0 carries a Medium conflict and timeslot 1 is free; the
        // selection must avoid the conflict.
        let choices = select_colors(&instance, &slot_state, 0, 1);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].color.timeslot, Some(1));

        // Two candidates: both timeslots, cheapest first
        let choices = select_colors(&instance, &slot_state, 0, 2);
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].color.timeslot, Some(1));
        assert_eq!(choices[1].color.timeslot, Some(0));
        assert!(choices[0].score <= choices[1].score);
    }

    #[test]
    fn test_select_colors_sentinel() {
        let instance = make_instance();
        let mut slot_state = super::super::state::SlotState::new(&instance);
        // Take MAT_111_1's only room at both of its candidate timeslots
        slot_state.assign(
            &instance,
            0,
            &Color {
                timeslot: Some(0),
                room: Some(0),
            },
        );
        slot_state.assign(
            &instance,
            2,
            &Color {
                timeslot: Some(1),
                room: Some(0),
            },
        );

        let choices = select_colors(&instance, &slot_state, 1, 1);
        assert_eq!(
            choices[0].color,
            Color {
                timeslot: None,
                room: None
            }
        );
    }

    #[test]
    fn test_uncolored_aggregates() {
        let instance = make_instance();
        let slot_state = super::super::state::SlotState::new(&instance);
        let mut schedule: PartialSchedule = vec![None, None, None];

        let aggregates = uncolored_aggregates(&instance, &slot_state, &schedule);
        // One Medium edge, seen from both endpoints
        assert_eq!(aggregates.num_edges, 2);
        assert_float_absolute_eq!(aggregates.total_edge_weight, 40.0, 1e-9);
        assert_float_absolute_eq!(aggregates.bad_value_of_edges, 2.0, 1e-9);

        schedule[1] = Some(Color {
            timeslot: Some(0),
            room: Some(0),
        });
        let aggregates = uncolored_aggregates(&instance, &slot_state, &schedule);
        assert_eq!(aggregates.num_edges, 0);
        assert_float_absolute_eq!(aggregates.total_edge_weight, 0.0, 1e-9);
    }
}
