
pub mod graph;
pub mod io;
pub mod solver;
pub mod timegrid;

use serde::{Deserialize, Serialize};

/// Severity class of a pairwise conflict between two sections.
///
/// The wire representation uses the single-letter tags of the conflict
/// lists ("I", "H", "M", "L"). Instructor and Heavy conflicts carry the
/// same numeric penalty but are kept apart, since instructor edges are
/// generated from shared instructor tokens rather than co-enrollment data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "I")]
    Instructor,
    #[serde(rename = "H")]
    Heavy,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Light,
}

/// Representation of one course section's data (a vertex of the conflict graph)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    /// Section name, including the section number (e.g. "CMS_230_1"). Lab sections carry "LAB" in
    /// their name.
    pub name: String,
    /// Instructor token. Sections sharing a non-empty instructor token are connected by an
    /// instructor conflict edge.
    pub instructor: String,
    /// Ids of the acceptable timeslots, in order of declaration
    pub timeslots: Vec<usize>,
    /// Tokens of the acceptable rooms (building plus number), in order of declaration
    pub rooms: Vec<String>,
}

impl Section {
    /// Lab sections are much harder to re-room than lectures, so they get a far larger urgency
    /// boost when they run out of open rooms.
    pub fn is_lab(&self) -> bool {
        self.name.contains("LAB")
    }
}

/// One entry of the explicit conflict list: an undirected conflict between two sections with a
/// severity tag and a co-enrollment overlap factor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictDecl {
    pub first: String,
    pub second: String,
    pub severity: Severity,
    /// Overlap factor, used as multiplier on the timeslot gap in the proximity penalty
    pub overlap: u32,
}

/// A complete timetabling problem instance, as consumed by `solver::solve()`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Problem {
    /// Timeslot descriptions in the textual form
    /// `<id> <DAYS> <h:mm> <am|pm> - <h:mm> <am|pm> [; <component>]*`. The ids must form the
    /// contiguous range `0..timeslots.len()`.
    pub timeslots: Vec<String>,
    /// All room tokens sections may reference
    pub rooms: Vec<String>,
    pub sections: Vec<Section>,
    pub conflicts: Vec<ConflictDecl>,
}

/// Placement of a single section in the calculated schedule.
///
/// Both fields are `None` exactly if no acceptable timeslot with an open acceptable room was left
/// for the section, which is penalized but not an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub timeslot: Option<usize>,
    pub room: Option<String>,
}
