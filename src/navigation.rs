//! The navigation sequencer. Documents declare their neighbors with `prev`
//! and `next`; this module checks those declarations and turns them into a
//! reading order. The declarations are validated (dangling pointers,
//! asymmetry, conflicts, cycles) rather than trusted, and every problem is
//! reported as a diagnostic instead of stopping the build.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::DocId;
use crate::loader::Library;

const INDEX: &str = "index";

/// Which of a document's two navigation pointers is meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Prev => Direction::Next,
            Direction::Next => Direction::Prev,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Direction::Prev => "prev",
            Direction::Next => "next",
        })
    }
}

/// The reading order of a book: a list of sequences, each a maximal chain
/// of documents linked by prev/next. The table of contents lists the
/// sequences in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Navigation {
    sequences: Vec<Vec<DocId>>,

    /// `(sequence index, position)` for every sequenced document.
    positions: HashMap<DocId, (usize, usize)>,
}

impl Navigation {
    fn new(sequences: Vec<Vec<DocId>>) -> Navigation {
        let mut positions = HashMap::new();
        for (i, sequence) in sequences.iter().enumerate() {
            for (j, id) in sequence.iter().enumerate() {
                positions.insert(id.clone(), (i, j));
            }
        }
        Navigation {
            sequences,
            positions,
        }
    }

    pub fn sequences(&self) -> &[Vec<DocId>] {
        &self.sequences
    }

    /// All sequenced documents, sequence after sequence.
    pub fn reading_order(&self) -> impl Iterator<Item = &DocId> {
        self.sequences.iter().flatten()
    }

    pub fn contains(&self, id: &DocId) -> bool {
        self.positions.contains_key(id)
    }

    /// The previous and next documents of `id` in its sequence. Both are
    /// `None` for documents that aren't sequenced.
    pub fn neighbors(&self, id: &DocId) -> (Option<&DocId>, Option<&DocId>) {
        match self.positions.get(id) {
            None => (None, None),
            Some(&(i, j)) => {
                let sequence = &self.sequences[i];
                let prev = match j {
                    0 => None,
                    _ => sequence.get(j - 1),
                };
                (prev, sequence.get(j + 1))
            }
        }
    }
}

// A candidate edge `from -> to`, declared by `declared_by`'s `direction`
// pointer.
struct Edge<'a> {
    from: &'a DocId,
    to: &'a DocId,
    declared_by: &'a DocId,
    direction: Direction,
}

/// Sequences the documents of `library`. Documents are visited in identifier
/// order, so when two declarations conflict the one from the
/// lexicographically smaller document wins (and `next` pointers are applied
/// before `prev` pointers).
pub fn sequence(library: &Library) -> (Navigation, Diagnostics) {
    let mut diagnostics = Diagnostics::default();

    check_pointers(library, &mut diagnostics);

    let mut edges: Vec<Edge> = Vec::new();
    for document in library.iter() {
        let next = document.next.as_ref().filter(|id| library.contains(id));
        if let Some(next) = next {
            edges.push(Edge {
                from: &document.id,
                to: next,
                declared_by: &document.id,
                direction: Direction::Next,
            });
        }
    }
    for document in library.iter() {
        let prev = document
            .prev
            .as_ref()
            .and_then(|id| library.get(id))
            .filter(|prev| prev.next.is_none());
        if let Some(prev) = prev {
            edges.push(Edge {
                from: &prev.id,
                to: &document.id,
                declared_by: &document.id,
                direction: Direction::Prev,
            });
        }
    }

    let mut successors: BTreeMap<&DocId, &DocId> = BTreeMap::new();
    let mut predecessors: BTreeMap<&DocId, &DocId> = BTreeMap::new();
    for edge in edges {
        let existing = match edge.direction {
            Direction::Next => predecessors.get(edge.to),
            Direction::Prev => successors.get(edge.from),
        };
        let existing = existing.or_else(|| match edge.direction {
            Direction::Next => successors.get(edge.from),
            Direction::Prev => predecessors.get(edge.to),
        });
        if let Some(&existing) = existing {
            let target = match edge.direction {
                Direction::Next => edge.to,
                Direction::Prev => edge.from,
            };
            diagnostics.push(
                edge.declared_by.clone(),
                DiagnosticKind::ConflictingNavigation {
                    direction: edge.direction,
                    target: target.clone(),
                    existing: existing.clone(),
                },
            );
            continue;
        }
        successors.insert(edge.from, edge.to);
        predecessors.insert(edge.to, edge.from);
    }

    // Every document without a predecessor heads a sequence; `index` leads.
    let mut heads: Vec<&DocId> = library
        .ids()
        .filter(|id| !predecessors.contains_key(id))
        .collect();
    heads.sort_by_key(|id| id.as_str() != INDEX);

    let mut visited: HashSet<&DocId> = HashSet::new();
    let mut sequences = Vec::with_capacity(heads.len());
    for head in heads {
        let mut chain = Vec::new();
        let mut current = Some(head);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            chain.push(id.clone());
            current = successors.get(id).copied();
        }
        sequences.push(chain);
    }

    // Whatever wasn't reached from a head sits on a cycle.
    let unreached: Vec<&DocId> =
        library.ids().filter(|id| !visited.contains(id)).collect();
    for members in cycles(&unreached, &successors) {
        if let Some(start) = members.first().cloned() {
            tracing::debug!(size = members.len(), %start, "navigation cycle");
            diagnostics
                .push(start, DiagnosticKind::NavigationCycle { members });
        }
    }

    tracing::info!(
        sequences = sequences.len(),
        sequenced = visited.len(),
        unsequenced = unreached.len(),
        "sequenced navigation"
    );
    (Navigation::new(sequences), diagnostics)
}

// Reports a diagnostic for every dangling or unmirrored pointer.
fn check_pointers(library: &Library, diagnostics: &mut Diagnostics) {
    for document in library.iter() {
        for direction in [Direction::Prev, Direction::Next] {
            let target = match document.pointer(direction) {
                Some(target) => target,
                None => continue,
            };
            match library.get(target) {
                None => diagnostics.push(
                    document.id.clone(),
                    DiagnosticKind::BrokenNavigationLink {
                        direction,
                        target: target.to_string(),
                    },
                ),
                Some(other) => {
                    let back = other.pointer(direction.opposite());
                    if back != Some(&document.id) {
                        diagnostics.push(
                            document.id.clone(),
                            DiagnosticKind::AsymmetricNavigation {
                                direction,
                                target: target.clone(),
                                found: back.cloned(),
                            },
                        );
                    }
                }
            }
        }
    }
}

// Groups `nodes` into cycles along `successors`. Each cycle is listed in
// chain order starting from its smallest identifier; cycles are ordered by
// that identifier.
fn cycles(
    nodes: &[&DocId],
    successors: &BTreeMap<&DocId, &DocId>,
) -> Vec<Vec<DocId>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for id in nodes {
        graph.add_node(id.as_str());
    }
    for id in nodes {
        if let Some(next) = successors.get(id) {
            graph.add_edge(id.as_str(), next.as_str(), ());
        }
    }

    let mut cycles: Vec<Vec<DocId>> = Vec::new();
    for component in tarjan_scc(&graph) {
        let start = match component.iter().min() {
            Some(&start) => start,
            None => continue,
        };
        if component.len() == 1 && !graph.contains_edge(start, start) {
            continue;
        }

        let mut members = Vec::with_capacity(component.len());
        let mut current = nodes.iter().copied().find(|id| id.as_str() == start);
        while let Some(id) = current {
            if members.len() == component.len() || members.contains(id) {
                break;
            }
            members.push(id.clone());
            current = successors.get(id).copied();
        }
        cycles.push(members);
    }
    cycles.sort();
    cycles
}
