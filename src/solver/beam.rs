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

//! The priority-queue ("beam search") constructor: a bounded best-first exploration of partial
//! schedules.
//!
//! Pending partial schedules are stored on a heap (priority queue), ordered by a weighted priority
//! score combining the partial schedule's total penalty with heuristics over its uncolored
//! remainder. Each queue entry carries its own snapshot of the incremental slot-state, so entries
//! can be expanded independently; the queue is truncated to the configured maximum length after
//! every expansion, which bounds the number of live snapshots. Partial schedules that have already
//! been expanded once are recognized by their canonical (vertex, timeslot) list and skipped.
//!
//! A queue entry without uncolored vertices is a leaf; the best leaf by total penalty wins.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use log::debug;
use ordered_float::NotNan;

use super::state::SlotState;
use super::{score, Instance, PartialSchedule, Statistics};

struct QueueEntry {
    priority: NotNan<f64>,
    /// Monotonic insertion number, as deterministic tie-break between equal priorities
    sequence: u64,
    schedule: PartialSchedule,
    slot_state: SlotState,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Run the beam search and return the best complete schedule, together with the slot-state that
/// belongs to it (the improver continues from that state).
pub(super) fn construct(
    instance: &Instance,
    statistics: &mut Statistics,
) -> Result<(PartialSchedule, SlotState), String> {
    let config = &instance.config;

    let mut queue: BinaryHeap<Reverse<QueueEntry>> = BinaryHeap::new();
    let mut sequence = 0u64;
    queue.push(Reverse(QueueEntry {
        priority: not_nan(0.0),
        sequence,
        schedule: vec![None; instance.sections.len()],
        slot_state: SlotState::new(instance),
    }));

    // size of partial schedule -> canonical keys already expanded
    let mut expanded: HashMap<usize, HashSet<String>> = HashMap::new();

    let mut best: Option<(PartialSchedule, SlotState)> = None;
    let mut min_penalty = f64::INFINITY;

    while let Some(Reverse(entry)) = queue.pop() {
        let QueueEntry {
            schedule,
            slot_state,
            ..
        } = entry;

        let size = schedule.iter().filter(|color| color.is_some()).count();
        if !expanded
            .entry(size)
            .or_insert_with(HashSet::new)
            .insert(canonical_key(&schedule))
        {
            statistics.duplicate_nodes += 1;
            continue;
        }

        let vertices = score::most_troublesome_vertices(
            instance,
            &slot_state,
            &schedule,
            config.num_vertices_to_expand,
        );

        if vertices.is_empty() {
            // Leaf: a complete coloring
            statistics.leaf_nodes += 1;
            let penalty = score::total_penalty(instance, &schedule).total();
            debug!("Beam search found a complete schedule with penalty {}", penalty);
            if penalty < min_penalty {
                min_penalty = penalty;
                best = Some((schedule, slot_state));
            }
            continue;
        }

        statistics.expanded_nodes += 1;
        for vertex in vertices {
            let choices =
                score::select_colors(instance, &slot_state, vertex, config.num_colors_per_vertex);
            for choice in choices {
                let mut child_schedule = schedule.clone();
                let mut child_state = slot_state.clone();
                child_schedule[vertex] = Some(choice.color);
                child_state.assign(instance, vertex, &choice.color);

                let aggregates =
                    score::uncolored_aggregates(instance, &child_state, &child_schedule);
                let penalty = score::total_penalty(instance, &child_schedule).total();
                let priority = config.priority_penalty_weight * penalty
                    + config.priority_bad_value_weight * aggregates.total_bad_value
                    + config.priority_edge_weight * aggregates.total_edge_weight
                    + config.priority_num_edges_weight * aggregates.num_edges as f64
                    + config.priority_bad_edges_weight * aggregates.bad_value_of_edges;

                sequence += 1;
                queue.push(Reverse(QueueEntry {
                    priority: not_nan(priority),
                    sequence,
                    schedule: child_schedule,
                    slot_state: child_state,
                }));
            }
        }

        // Keep only the entries with the smallest priority scores
        if queue.len() > config.max_queue_length {
            let mut entries: Vec<QueueEntry> =
                queue.drain().map(|Reverse(entry)| entry).collect();
            entries.sort();
            entries.truncate(config.max_queue_length);
            queue = entries.into_iter().map(Reverse).collect();
        }
    }

    best.ok_or_else(|| "Beam search did not produce a complete schedule".to_owned())
}

/// Canonical representation of a partial schedule for duplicate suppression: the list of
/// (vertex, timeslot) pairs of all colored vertices, which is sorted by construction
fn canonical_key(schedule: &PartialSchedule) -> String {
    let pairs: Vec<(usize, Option<usize>)> = schedule
        .iter()
        .enumerate()
        .filter_map(|(vertex, color)| color.as_ref().map(|c| (vertex, c.timeslot)))
        .collect();
    format!("{:?}", pairs)
}

fn not_nan(value: f64) -> NotNan<f64> {
    NotNan::new(value).expect("Priority scores must not be NaN.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_ignores_rooms() {
        use super::super::Color;
        let a: PartialSchedule = vec![
            Some(Color {
                timeslot: Some(1),
                room: Some(0),
            }),
            None,
        ];
        let b: PartialSchedule = vec![
            Some(Color {
                timeslot: Some(1),
                room: Some(1),
            }),
            None,
        ];
        let c: PartialSchedule = vec![
            Some(Color {
                timeslot: Some(2),
                room: Some(0),
            }),
            None,
        ];
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_ne!(canonical_key(&a), canonical_key(&c));
    }
}
