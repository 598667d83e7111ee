// Copyright 2020 by Michael Thies <mail@mhthies.de>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The timetabling solver: orchestration of the greedy one-pass and the priority-queue (beam
//! search) constructors and the local-search improver.
//!
//! The solver views the problem as a graph coloring problem: sections are vertices, pairwise
//! conflicts are weighted edges, timeslots are the colors. Construction repeatedly picks the
//! "most troublesome" uncolored vertex (the one with the worst outlook over its remaining
//! candidate timeslots) and assigns it the (timeslot, room) pair that a linear combination of
//! conflict penalty, proximity penalty and a one-step look-ahead considers cheapest. All penalty
//! lookups are O(1) thanks to incremental per-(vertex, timeslot) bookkeeping in the slot-state,
//! which is updated on every (un)placement.
//!
//! `solve()` is the only entry point: it validates the problem, builds the conflict graph and the
//! timeslot tables, runs the configured constructor and a fixed number of improvement passes, and
//! returns the complete schedule together with its penalty report.

mod beam;
mod improve;
mod score;
mod state;

use std::collections::HashMap;
use std::{fmt, time};

use log::{debug, info};

use crate::graph::ConflictGraph;
use crate::timegrid::{TimeGrid, Timeslot};
use crate::{Placement, Problem};

pub use self::score::PenaltyBreakdown;
use self::state::SlotState;

/// All numeric knobs of the solver, with the production defaults.
///
/// Only `use_beam_search` and `improver_passes` change the control flow; the remaining fields tune
/// the penalty model and the heuristics. The beam weights have no effect under the default
/// one-pass constructor but stay adjustable for experimentation.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Use the priority-queue (beam search) constructor instead of the one-pass constructor
    pub use_beam_search: bool,
    /// Multiplier on the conflict term of the total penalty
    pub conflict_penalty_weight: f64,
    /// Multiplier on the proximity term of the total penalty
    pub proximity_penalty_weight: f64,
    /// Per-meeting-pair gaps up to this many hours contribute no proximity penalty
    pub max_ignored_gap_width: f64,
    /// Conflict penalty above which a candidate timeslot counts as "bad"
    pub conflict_penalty_threshold: f64,
    /// Proximity penalty above which a candidate timeslot counts as "bad"
    pub proximity_penalty_threshold: f64,
    /// Penalty per section that could not be assigned any room
    pub unassigned_room_penalty: f64,
    /// Overlap factor of the generated instructor edges
    pub instructor_overlap_weight: u32,
    /// Weight of the conflict penalty in the color selection score
    pub combo_conflict_weight: f64,
    /// Weight of the proximity penalty in the color selection score
    pub combo_proximity_weight: f64,
    /// Weight of the good-to-bad switch count in the color selection score
    pub combo_switch_weight: f64,
    /// Beam priority: weight of the partial schedule's total penalty
    pub priority_penalty_weight: f64,
    /// Beam priority: weight of the summed bad value of colors of the uncolored vertices
    pub priority_bad_value_weight: f64,
    /// Beam priority: weight of the summed edge weight between uncolored vertices
    pub priority_edge_weight: f64,
    /// Beam priority: weight of the number of edges between uncolored vertices
    pub priority_num_edges_weight: f64,
    /// Beam priority: weight of the bad value of the edges between uncolored vertices
    pub priority_bad_edges_weight: f64,
    /// Number of most-troublesome vertices to branch on per beam node
    pub num_vertices_to_expand: usize,
    /// Number of candidate timeslots to branch on per expanded vertex
    pub num_colors_per_vertex: usize,
    /// Maximum number of partial schedules kept in the beam queue
    pub max_queue_length: usize,
    /// Number of local-search passes after construction
    pub improver_passes: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            use_beam_search: false,
            conflict_penalty_weight: 25.0,
            proximity_penalty_weight: 1.0,
            max_ignored_gap_width: 2.0,
            conflict_penalty_threshold: 15.0,
            proximity_penalty_threshold: 1000.0,
            unassigned_room_penalty: 1000.0,
            instructor_overlap_weight: 15,
            combo_conflict_weight: 20.0,
            combo_proximity_weight: 1.0,
            combo_switch_weight: 18.0,
            priority_penalty_weight: 50.0,
            priority_bad_value_weight: 200.0,
            priority_edge_weight: 5.0,
            priority_num_edges_weight: 38.0,
            priority_bad_edges_weight: 23.0,
            num_vertices_to_expand: 1,
            num_colors_per_vertex: 2,
            max_queue_length: 5,
            improver_passes: 10,
        }
    }
}

/// A (timeslot, room) choice for a single vertex, with room tokens interned to indexes.
///
/// Both fields are `None` exactly if no acceptable timeslot with an open room was left when the
/// vertex was colored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Color {
    pub timeslot: Option<usize>,
    pub room: Option<usize>,
}

/// An in-progress coloring: `None` entries are vertices that have not been colored yet. Note that
/// a colored vertex may still hold a `Color` without timeslot and room (the sentinel placement).
pub(crate) type PartialSchedule = Vec<Option<Color>>;

/// Validated, index-interned section data used by the solver internals
pub(crate) struct SectionData {
    pub name: String,
    pub is_lab: bool,
    /// Acceptable timeslot ids, in declared order
    pub timeslots: Vec<usize>,
    /// Acceptable rooms as indexes into the problem's room list, in declared order
    pub rooms: Vec<usize>,
}

/// The fully precomputed problem: interned sections, conflict graph, timeslot tables and the
/// configuration. Everything the search algorithms read but never modify.
pub(crate) struct Instance {
    pub sections: Vec<SectionData>,
    pub graph: ConflictGraph,
    pub grid: TimeGrid,
    pub config: SolverConfig,
}

/// Counters collected while solving.
#[derive(Default)]
pub struct Statistics {
    /// Number of beam queue entries that have been expanded
    pub expanded_nodes: u32,
    /// Number of beam queue entries skipped as duplicates of an already expanded partial schedule
    pub duplicate_nodes: u32,
    /// Number of complete schedules evaluated by the beam search
    pub leaf_nodes: u32,
    /// Number of accepted reassignments in the improvement passes
    pub improver_moves: u32,
    /// Total time for solving, including construction and improvement
    pub total_time: time::Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solving statistics:
Expanded beam nodes:    {: >6}
Suppressed duplicates:  {: >6}
Evaluated leaves:       {: >6}
Improver moves:         {: >6}

Total time: {:.3}s\n",
            self.expanded_nodes,
            self.duplicate_nodes,
            self.leaf_nodes,
            self.improver_moves,
            self.total_time.as_millis() as f32 / 1000f32,
        )
    }
}

/// Result of a successful solver run
pub struct Solution {
    /// One placement per section, in the order of the problem's section list
    pub placements: Vec<Placement>,
    /// Penalty report of the final schedule, including the count of sections without a room
    pub penalty: PenaltyBreakdown,
    pub statistics: Statistics,
}

/// Main method of this module: solve a complete timetabling problem.
///
/// Validates the input (unparsable timeslots, unknown timeslot/room/section references and empty
/// acceptable sets are fatal), builds the conflict graph and timeslot tables, runs the configured
/// constructor and the improvement passes, and returns the resulting schedule with its penalty.
///
/// Sections for which no acceptable timeslot has an open acceptable room are placed as
/// `(None, None)` and each contribute the unassigned-room penalty; this is reported, not an error.
pub fn solve(problem: &Problem, config: SolverConfig) -> Result<Solution, String> {
    let tic = time::Instant::now();
    let instance = build_instance(problem, config)?;
    let mut statistics = Statistics::default();

    let (mut schedule, mut slot_state) = if instance.config.use_beam_search {
        beam::construct(&instance, &mut statistics)?
    } else {
        let mut slot_state = SlotState::new(&instance);
        let mut schedule: PartialSchedule = vec![None; instance.sections.len()];
        one_pass(&instance, &mut slot_state, &mut schedule);
        (schedule, slot_state)
    };

    debug!(
        "Total penalty before improvement: {}",
        score::total_penalty(&instance, &schedule).total()
    );
    for _ in 0..instance.config.improver_passes {
        improve::improve_pass(&instance, &mut slot_state, &mut schedule, &mut statistics);
    }

    statistics.total_time = tic.elapsed();
    let penalty = score::total_penalty(&instance, &schedule);
    if penalty.num_unplaced > 0 {
        info!(
            "{} sections could not be assigned a room at any acceptable timeslot.",
            penalty.num_unplaced
        );
    }

    let placements = schedule
        .iter()
        .map(|color| match color {
            Some(color) => Placement {
                timeslot: color.timeslot,
                room: color.room.map(|r| problem.rooms[r].clone()),
            },
            None => Placement {
                timeslot: None,
                room: None,
            },
        })
        .collect();

    Ok(Solution {
        placements,
        penalty,
        statistics,
    })
}

/// Validate the problem and intern all cross references into dense indexes
pub(crate) fn build_instance(problem: &Problem, config: SolverConfig) -> Result<Instance, String> {
    let timeslots = problem
        .timeslots
        .iter()
        .map(|entry| Timeslot::parse(entry))
        .collect::<Result<Vec<Timeslot>, String>>()?;
    let grid = TimeGrid::build(&timeslots, config.max_ignored_gap_width)?;
    let graph = ConflictGraph::build(
        &problem.sections,
        &problem.conflicts,
        config.instructor_overlap_weight,
    )?;

    let mut room_index: HashMap<&str, usize> = HashMap::new();
    for (i, room) in problem.rooms.iter().enumerate() {
        if room_index.insert(room.as_str(), i).is_some() {
            return Err(format!("Duplicate room token \"{}\"", room));
        }
    }

    let mut sections = Vec::with_capacity(problem.sections.len());
    for section in &problem.sections {
        if section.timeslots.is_empty() {
            return Err(format!(
                "Section \"{}\" has no acceptable timeslots",
                section.name
            ));
        }
        if section.rooms.is_empty() {
            return Err(format!(
                "Section \"{}\" has no acceptable rooms",
                section.name
            ));
        }
        let mut seen_slots = vec![false; grid.num_timeslots()];
        for &t in &section.timeslots {
            if t >= grid.num_timeslots() {
                return Err(format!(
                    "Section \"{}\" references unknown timeslot id {}",
                    section.name, t
                ));
            }
            if seen_slots[t] {
                return Err(format!(
                    "Section \"{}\" lists timeslot {} twice",
                    section.name, t
                ));
            }
            seen_slots[t] = true;
        }
        let mut rooms = Vec::with_capacity(section.rooms.len());
        for room in &section.rooms {
            let r = *room_index.get(room.as_str()).ok_or_else(|| {
                format!(
                    "Section \"{}\" references unknown room \"{}\"",
                    section.name, room
                )
            })?;
            if rooms.contains(&r) {
                return Err(format!(
                    "Section \"{}\" lists room \"{}\" twice",
                    section.name, room
                ));
            }
            rooms.push(r);
        }
        sections.push(SectionData {
            name: section.name.clone(),
            is_lab: section.is_lab(),
            timeslots: section.timeslots.clone(),
            rooms,
        });
    }

    Ok(Instance {
        sections,
        graph,
        grid,
        config,
    })
}

/// The one-pass construction strategy is a basic greedy algorithm: while there are uncolored
/// vertices, choose the most troublesome one and color it with its cheapest (timeslot, room)
/// choice, without backtracking. Terminates after exactly one step per vertex.
fn one_pass(instance: &Instance, slot_state: &mut SlotState, schedule: &mut PartialSchedule) {
    while let Some(vertex) = score::most_troublesome_vertex(instance, slot_state, schedule) {
        let choice = score::select_colors(instance, slot_state, vertex, 1)
            .into_iter()
            .next()
            .expect("select_colors returns at least one candidate");
        debug!(
            "Placing {} at timeslot {:?}, room {:?}",
            instance.sections[vertex].name, choice.color.timeslot, choice.color.room
        );
        schedule[vertex] = Some(choice.color);
        slot_state.assign(instance, vertex, &choice.color);
    }
}
