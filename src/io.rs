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

pub mod simple;

use crate::{Placement, Problem};
use std::fmt::Write;

/// Format the calculated schedule into a human readable String (e.g. to print it to stdout).
///
/// The output format will look like
/// ```text
/// ===== 0 MWF 9:00 am - 9:50 am =====
/// - CMS_167_1 (BUSH_310, Myers)
/// - MAT_111_1 (BUSH_212, Lee)
///
/// ===== 1 MWF 10:00 am - 10:50 am =====
/// …
///
/// sections without a room:
/// - BIO_308_1
/// ```
pub fn format_schedule(placements: &[Placement], problem: &Problem) -> String {
    let mut result = String::new();
    for (t, timeslot) in problem.timeslots.iter().enumerate() {
        write!(result, "\n===== {} =====\n", timeslot).unwrap();
        for (section, placement) in problem.sections.iter().zip(placements) {
            if placement.timeslot == Some(t) {
                writeln!(
                    result,
                    "- {} ({}{}{})",
                    section.name,
                    placement.room.as_deref().unwrap_or("no room"),
                    if section.instructor.is_empty() { "" } else { ", " },
                    section.instructor
                )
                .unwrap();
            }
        }
    }

    let unplaced: Vec<&str> = problem
        .sections
        .iter()
        .zip(placements)
        .filter(|(_, placement)| placement.timeslot.is_none())
        .map(|(section, _)| section.name.as_str())
        .collect();
    if !unplaced.is_empty() {
        writeln!(result, "\nsections without a room:").unwrap();
        for name in unplaced {
            writeln!(result, "- {}", name).unwrap();
        }
    }

    result
}

/// Assert that a given problem data structure is consistent (in terms of cross referencing
/// timeslot ids, room tokens and section names)
pub fn assert_data_consistency(problem: &Problem) {
    for (i, section) in problem.sections.iter().enumerate() {
        assert!(
            !section.timeslots.is_empty(),
            "Section {} ({}) has no acceptable timeslots",
            i,
            section.name
        );
        for t in section.timeslots.iter() {
            assert!(
                *t < problem.timeslots.len(),
                "Timeslot {} of section {} is invalid",
                t,
                i
            );
        }
        for room in section.rooms.iter() {
            assert!(
                problem.rooms.contains(room),
                "Room {} of section {} is invalid",
                room,
                i
            );
        }
    }
    for (i, conflict) in problem.conflicts.iter().enumerate() {
        for name in [&conflict.first, &conflict.second].iter() {
            assert!(
                problem.sections.iter().any(|s| s.name == **name),
                "Section {} of conflict {} is invalid",
                name,
                i
            );
        }
    }
}
