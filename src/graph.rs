//! Construction of the conflict graph: vertices are section indexes, edges carry a severity tag
//! and a co-enrollment overlap factor.
//!
//! There are two sources of edges: sections sharing a (non-empty) instructor token are connected
//! by an Instructor edge with a fixed overlap factor, and the explicit conflict list of the input.
//! When an explicit conflict hits a pair that already has an instructor edge, the overlap factors
//! add up while the Instructor severity is kept.

use std::collections::{BTreeMap, HashMap};

use crate::{ConflictDecl, Section, Severity};

/// A conflict-graph edge between two sections
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub severity: Severity,
    /// Multiplier on the timeslot gap in the proximity penalty
    pub overlap: u32,
}

/// Adjacency structure of the conflict graph.
///
/// Neighbors are kept in a `BTreeMap` keyed by the neighbor's vertex index, so that all iteration
/// over a vertex's edges happens in ascending index order. The solver's tie-breaking depends on
/// this order being fixed.
pub struct ConflictGraph {
    adjacency: Vec<BTreeMap<usize, Edge>>,
}

impl ConflictGraph {
    pub fn build(
        sections: &[Section],
        conflicts: &[ConflictDecl],
        instructor_overlap_weight: u32,
    ) -> Result<ConflictGraph, String> {
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (i, section) in sections.iter().enumerate() {
            if index_of.insert(section.name.as_str(), i).is_some() {
                return Err(format!("Duplicate section name \"{}\"", section.name));
            }
        }

        let mut adjacency = vec![BTreeMap::new(); sections.len()];

        // Instructor edges for every pair of sections with the same non-empty instructor token
        for (v, a) in sections.iter().enumerate() {
            if a.instructor.is_empty() {
                continue;
            }
            for (u, b) in sections.iter().enumerate().skip(v + 1) {
                if a.instructor == b.instructor {
                    let edge = Edge {
                        severity: Severity::Instructor,
                        overlap: instructor_overlap_weight,
                    };
                    adjacency[v].insert(u, edge);
                    adjacency[u].insert(v, edge);
                }
            }
        }

        // Merge in the explicit conflict list
        for decl in conflicts {
            let v = *index_of.get(decl.first.as_str()).ok_or_else(|| {
                format!("Conflict references unknown section \"{}\"", decl.first)
            })?;
            let u = *index_of.get(decl.second.as_str()).ok_or_else(|| {
                format!("Conflict references unknown section \"{}\"", decl.second)
            })?;
            if v == u {
                return Err(format!(
                    "Conflict pairs section \"{}\" with itself",
                    decl.first
                ));
            }
            // An existing edge (from a shared instructor or an earlier conflict entry) keeps its
            // severity; only the overlap factors add up.
            let merged = {
                let edge = adjacency[v].entry(u).or_insert(Edge {
                    severity: decl.severity,
                    overlap: 0,
                });
                edge.overlap += decl.overlap;
                *edge
            };
            adjacency[u].insert(v, merged);
        }

        Ok(ConflictGraph { adjacency })
    }

    /// All edges of the given vertex, in ascending neighbor index order
    pub fn neighbors(&self, vertex: usize) -> impl Iterator<Item = (usize, &Edge)> + '_ {
        self.adjacency[vertex].iter().map(|(u, edge)| (*u, edge))
    }

    pub fn edge(&self, v: usize, u: usize) -> Option<&Edge> {
        self.adjacency[v].get(&u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Section;

    fn make_section(name: &str, instructor: &str) -> Section {
        Section {
            name: name.to_owned(),
            instructor: instructor.to_owned(),
            timeslots: vec![0],
            rooms: vec!["R1".to_owned()],
        }
    }

    fn make_conflict(first: &str, second: &str, severity: Severity, overlap: u32) -> ConflictDecl {
        ConflictDecl {
            first: first.to_owned(),
            second: second.to_owned(),
            severity,
            overlap,
        }
    }

    #[test]
    fn test_instructor_edges() {
        let sections = vec![
            make_section("CMS_167_1", "Myers"),
            make_section("CMS_167_2", "Myers"),
            make_section("MAT_111_1", "Lee"),
            make_section("PED_101_1", ""),
            make_section("PED_102_1", ""),
        ];
        let graph = ConflictGraph::build(&sections, &[], 15).unwrap();

        // Every pair with the same non-empty instructor has a symmetric Instructor edge
        for (v, a) in sections.iter().enumerate() {
            for (u, b) in sections.iter().enumerate() {
                if v != u && !a.instructor.is_empty() && a.instructor == b.instructor {
                    let edge = graph.edge(v, u).expect("Missing instructor edge");
                    assert_eq!(edge.severity, Severity::Instructor);
                    assert_eq!(edge.overlap, 15);
                    assert_eq!(graph.edge(v, u), graph.edge(u, v));
                }
            }
        }
        assert!(graph.edge(0, 2).is_none());
        // Empty instructor tokens must not connect sections
        assert!(graph.edge(3, 4).is_none());
    }

    #[test]
    fn test_explicit_conflicts() {
        let sections = vec![
            make_section("BIO_121_1", "Stone"),
            make_section("CHM_120_1", "Wall"),
            make_section("CHM_120_2", "Wall"),
        ];
        let conflicts = vec![
            make_conflict("BIO_121_1", "CHM_120_1", Severity::Heavy, 12),
            make_conflict("CHM_120_2", "BIO_121_1", Severity::Medium, 4),
        ];
        let graph = ConflictGraph::build(&sections, &conflicts, 15).unwrap();

        assert_eq!(
            graph.edge(0, 1),
            Some(&Edge {
                severity: Severity::Heavy,
                overlap: 12
            })
        );
        assert_eq!(
            graph.edge(2, 0),
            Some(&Edge {
                severity: Severity::Medium,
                overlap: 4
            })
        );
    }

    #[test]
    fn test_conflict_on_instructor_edge_keeps_severity() {
        let sections = vec![
            make_section("CMS_230_1", "Myers"),
            make_section("CMS_230_2", "Myers"),
        ];
        let conflicts = vec![make_conflict("CMS_230_1", "CMS_230_2", Severity::Heavy, 6)];
        let graph = ConflictGraph::build(&sections, &conflicts, 15).unwrap();

        let edge = graph.edge(0, 1).unwrap();
        assert_eq!(edge.severity, Severity::Instructor);
        assert_eq!(edge.overlap, 15 + 6);
        assert_eq!(graph.edge(1, 0), Some(edge));
    }

    #[test]
    fn test_build_errors() {
        let sections = vec![make_section("A", ""), make_section("B", "")];
        let unknown = vec![make_conflict("A", "C", Severity::Light, 1)];
        assert!(ConflictGraph::build(&sections, &unknown, 15).is_err());
        let reflexive = vec![make_conflict("A", "A", Severity::Light, 1)];
        assert!(ConflictGraph::build(&sections, &reflexive, 15).is_err());
        let duplicate_names = vec![make_section("A", ""), make_section("A", "")];
        assert!(ConflictGraph::build(&duplicate_names, &[], 15).is_err());
    }
}
