//! Qubit interference graph.
//!
//! Operations are numbered in execution order. Qubit `b` depends on qubit
//! `a` at an operation when some chain of operations, each sharing a qubit
//! with the next, leads from an earlier operation on `a` to it. For every
//! operation we keep, per qubit it depends on, the qubits seen along those
//! chains. Two qubits interfere when an operation acts on one of them while
//! the other lies on such a chain through any qubit of the same operation;
//! interfering qubits cannot share a register.
//!
//! For example, `op1(1) op2(1,2) op3(3) op4(3,4) op5(2,4,5)` gives:
//!
//! ```text
//! op2: 1{1,2} 2{1,2}
//! op4: 3{3,4} 4{3,4}
//! op5: 1{1,2,4,5} 2{1,2,4,5} 3{2,3,4,5} 4{2,3,4,5} 5{2,4,5}
//! ```

use petgraph::graphmap::UnGraphMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

type QubitSets = FxHashMap<u64, FxHashSet<u64>>;

/// Interference data collected from a stream of operations.
#[derive(Debug, Clone, Default)]
pub struct QubitInterferences {
    /// Qubit dependency sets, keyed by operation then by qubit.
    operations: FxHashMap<u64, QubitSets>,
    graph: UnGraphMap<u64, ()>,
    /// Lower bound of the width search.
    max_arity: usize,
}

impl QubitInterferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record operation `op` acting on `qubits`.
    ///
    /// `depends_on` lists the earlier operations that last acted on each of
    /// `qubits`. Operation ids must be unique.
    pub fn add_operation(&mut self, op: u64, depends_on: &[u64], qubits: &[u64]) {
        debug_assert!(!self.operations.contains_key(&op), "operation {op} recorded twice");
        let qubits: FxHashSet<u64> = qubits.iter().copied().collect();
        self.max_arity = self.max_arity.max(qubits.len());

        let mut sets = QubitSets::default();
        for &qubit in &qubits {
            sets.entry(qubit).or_default().extend(&qubits);
        }
        for earlier in depends_on {
            if let Some(earlier_sets) = self.operations.get(earlier) {
                for (&qubit, dependents) in earlier_sets {
                    sets.entry(qubit).or_default().extend(dependents);
                }
            }
        }
        for (qubit, dependents) in sets.iter_mut() {
            if !qubits.contains(qubit) {
                dependents.extend(&qubits);
            }
        }

        let interfering: FxHashSet<u64> = qubits
            .iter()
            .filter_map(|qubit| sets.get(qubit))
            .flatten()
            .copied()
            .collect();
        for &qubit in &qubits {
            for &other in &interfering {
                if qubit != other {
                    self.graph.add_edge(qubit, other, ());
                }
            }
        }

        self.operations.insert(op, sets);
    }

    /// Qubits that `qubit` depends on at operation `op`, sorted.
    pub fn dependents(&self, op: u64, qubit: u64) -> Option<Vec<u64>> {
        let mut qubits: Vec<u64> = self.operations.get(&op)?.get(&qubit)?.iter().copied().collect();
        qubits.sort_unstable();
        Some(qubits)
    }

    /// Whether `a` and `b` interfere.
    pub fn interfere(&self, a: u64, b: u64) -> bool {
        self.graph.contains_edge(a, b)
    }

    /// Number of qubits `qubit` interferes with.
    pub fn degree(&self, qubit: u64) -> usize {
        if self.graph.contains_node(qubit) {
            self.graph.neighbors(qubit).count()
        } else {
            0
        }
    }

    fn max_degree(&self) -> usize {
        self.graph
            .nodes()
            .map(|node| self.graph.neighbors(node).count())
            .max()
            .unwrap_or(0)
    }

    /// Whether the interference graph can be colored with `registers`
    /// colors, by repeatedly removing qubits with fewer interferences than
    /// that. A `false` answer may be pessimistic.
    pub fn can_fit(&self, registers: usize) -> bool {
        if self.max_degree() < registers {
            return true;
        }

        let mut graph = self.graph.clone();
        while let Some(node) = graph
            .nodes()
            .find(|&node| graph.neighbors(node).count() < registers)
        {
            graph.remove_node(node);
        }
        graph.node_count() == 0
    }

    /// Smallest register count found to fit, searched between the widest
    /// operation and one more than the largest number of interferences.
    #[instrument(skip(self), fields(qubits = self.graph.node_count()))]
    pub fn estimate_circuit_width(&self) -> usize {
        let mut required = self.max_arity;
        let mut sufficient = self.max_degree() + 1;
        if required >= sufficient {
            return required;
        }

        while required + 1 < sufficient {
            let candidate = (required + sufficient) / 2;
            if self.can_fit(candidate) {
                sufficient = candidate;
            } else {
                required = candidate;
            }
        }
        let width = if self.can_fit(required) {
            required
        } else {
            sufficient
        };
        debug!(width, "Estimated circuit width");
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_sets() {
        let mut interferences = QubitInterferences::new();
        interferences.add_operation(1, &[], &[1]);
        interferences.add_operation(2, &[1], &[1, 2]);
        interferences.add_operation(3, &[], &[3]);
        interferences.add_operation(4, &[3], &[3, 4]);
        interferences.add_operation(5, &[2, 4], &[2, 4, 5]);

        assert_eq!(interferences.dependents(2, 1), Some(vec![1, 2]));
        assert_eq!(interferences.dependents(4, 4), Some(vec![3, 4]));
        assert_eq!(interferences.dependents(5, 1), Some(vec![1, 2, 4, 5]));
        assert_eq!(interferences.dependents(5, 3), Some(vec![2, 3, 4, 5]));
        assert_eq!(interferences.dependents(5, 5), Some(vec![2, 4, 5]));
        assert_eq!(interferences.dependents(3, 1), None);
    }

    #[test]
    fn test_unrelated_qubits_do_not_interfere() {
        let mut interferences = QubitInterferences::new();
        interferences.add_operation(1, &[], &[1, 2]);
        interferences.add_operation(2, &[], &[3]);
        interferences.add_operation(3, &[2], &[3, 4]);

        assert!(interferences.interfere(1, 2));
        assert!(interferences.interfere(3, 4));
        assert!(!interferences.interfere(1, 3));
        assert_eq!(interferences.degree(2), 1);
        assert_eq!(interferences.estimate_circuit_width(), 2);
    }

    #[test]
    fn test_shared_qubit_links_both_neighbours() {
        // CNOT(1,2) then CNOT(2,3)
        let mut interferences = QubitInterferences::new();
        interferences.add_operation(1, &[], &[1, 2]);
        interferences.add_operation(2, &[1], &[2, 3]);

        assert!(interferences.interfere(1, 3));
        assert_eq!(interferences.estimate_circuit_width(), 3);
    }

    #[test]
    fn test_group_interference() {
        // CNOT(1,2), CNOT(3,4), CNOT(2,3) cannot run on two registers
        let mut interferences = QubitInterferences::new();
        interferences.add_operation(1, &[], &[1, 2]);
        interferences.add_operation(2, &[], &[3, 4]);
        interferences.add_operation(3, &[1, 2], &[2, 3]);

        assert!(interferences.interfere(1, 3));
        assert!(interferences.interfere(2, 4));
        assert!(!interferences.can_fit(2));
        assert_eq!(interferences.estimate_circuit_width(), 3);
    }

    #[test]
    fn test_no_operations() {
        let interferences = QubitInterferences::new();
        assert_eq!(interferences.degree(0), 0);
        assert!(interferences.can_fit(0));
        assert_eq!(interferences.estimate_circuit_width(), 0);
    }
}
