//! Incremental per-(vertex, timeslot) bookkeeping of conflict penalties, proximity penalties and
//! room availability.
//!
//! For every vertex and every timeslot, the state records the conflict and proximity penalty the
//! vertex would incur at that timeslot given the placements made so far, and how many placed
//! sections currently block each of the vertex's acceptable rooms there. `assign` and `unassign`
//! are exact inverses: any sequence of calls whose net effect is empty restores the state to its
//! initial value.

use ndarray::{Array1, Array2};

use super::score::severity_penalty;
use super::{Color, Instance};

#[derive(Clone, Debug, PartialEq)]
struct VertexState {
    /// Conflict penalty the vertex would incur at each timeslot, from already placed neighbors
    /// with overlapping assignments
    conflict: Array1<f64>,
    /// Proximity penalty the vertex would incur at each timeslot, from already placed neighbors
    proximity: Array1<f64>,
    /// blockers[[t, i]]: number of placed sections occupying the vertex's i-th acceptable room
    /// during a timeslot overlapping t. The room is open at t iff the count is 0.
    room_blockers: Array2<u32>,
}

/// The solver's full incremental state, one entry per vertex. Cloning it is the snapshot
/// mechanism of the beam search.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SlotState {
    vertices: Vec<VertexState>,
}

impl SlotState {
    /// Fresh state for an empty schedule: penalties all zero, no room blocked anywhere
    pub fn new(instance: &Instance) -> SlotState {
        let num_timeslots = instance.grid.num_timeslots();
        SlotState {
            vertices: instance
                .sections
                .iter()
                .map(|section| VertexState {
                    conflict: Array1::zeros([num_timeslots]),
                    proximity: Array1::zeros([num_timeslots]),
                    room_blockers: Array2::zeros([num_timeslots, section.rooms.len()]),
                })
                .collect(),
        }
    }

    /// Record the placement of `vertex` with the given color. Placing the sentinel color (no
    /// timeslot) is a no-op, since it overlaps nothing and has gap 0 with everything.
    pub fn assign(&mut self, instance: &Instance, vertex: usize, color: &Color) {
        self.update(instance, vertex, color, false);
    }

    /// Revert a previous `assign` of exactly this color for this vertex
    pub fn unassign(&mut self, instance: &Instance, vertex: usize, color: &Color) {
        self.update(instance, vertex, color, true);
    }

    fn update(&mut self, instance: &Instance, vertex: usize, color: &Color, revert: bool) {
        let timeslot = match color.timeslot {
            Some(t) => t,
            None => return,
        };
        let sign = if revert { -1.0 } else { 1.0 };

        for (u, edge) in instance.graph.neighbors(vertex) {
            let conflict_step = severity_penalty(edge.severity) * sign;
            let neighbor = &mut self.vertices[u];
            for &t in &instance.sections[u].timeslots {
                if instance.grid.overlaps(timeslot, t) {
                    neighbor.conflict[t] += conflict_step;
                }
                neighbor.proximity[t] +=
                    instance.grid.gap(timeslot, t) * edge.overlap as f64 * sign;
            }
        }

        let room = match color.room {
            Some(r) => r,
            None => return,
        };
        for (w, section) in instance.sections.iter().enumerate() {
            if w == vertex {
                continue;
            }
            let i = match section.rooms.iter().position(|&r| r == room) {
                Some(i) => i,
                None => continue,
            };
            let blockers = &mut self.vertices[w].room_blockers;
            for &t in &section.timeslots {
                if instance.grid.overlaps(timeslot, t) {
                    if revert {
                        blockers[[t, i]] -= 1;
                    } else {
                        blockers[[t, i]] += 1;
                    }
                }
            }
        }
    }

    pub fn conflict(&self, vertex: usize, timeslot: usize) -> f64 {
        self.vertices[vertex].conflict[timeslot]
    }

    pub fn proximity(&self, vertex: usize, timeslot: usize) -> f64 {
        self.vertices[vertex].proximity[timeslot]
    }

    /// Indexes (into the vertex's acceptable room list) of the rooms still open at the timeslot,
    /// in declared room order
    pub fn open_rooms<'a>(
        &'a self,
        vertex: usize,
        timeslot: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        self.vertices[vertex]
            .room_blockers
            .row(timeslot)
            .into_iter()
            .enumerate()
            .filter_map(|(i, &blockers)| if blockers == 0 { Some(i) } else { None })
    }

    pub fn num_open_rooms(&self, vertex: usize, timeslot: usize) -> usize {
        self.open_rooms(vertex, timeslot).count()
    }

    pub fn room_is_open(&self, vertex: usize, timeslot: usize, room_index: usize) -> bool {
        self.vertices[vertex].room_blockers[[timeslot, room_index]] == 0
    }
}
