//! Dependency tracking for formula calculation

use crate::oracle::SheetHandle;
use crate::value::Area;
use ahash::{AHashMap, AHashSet};

/// Unique key for a cell (sheet index + position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Whether an area covers this cell
    pub fn is_in(&self, area: &Area) -> bool {
        (area.first_sheet..=area.last_sheet).contains(&SheetHandle(self.sheet))
            && area.range.contains(self.row, self.col)
    }
}

/// Dependency graph for formula cells
///
/// Edges run from a precedent (a cell being read) to its dependents.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it
    dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Cell → Cells it depends on
    precedents: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph between formula cells from the areas each formula reads
    ///
    /// Only formula cells become nodes; plain values never need recalculation.
    pub fn from_formulas(formulas: &[(CellKey, Vec<Area>)]) -> Self {
        let mut graph = Self::new();
        for (dependent, areas) in formulas {
            for (precedent, _) in formulas {
                if areas.iter().any(|area| precedent.is_in(area)) {
                    graph.add_dependency(*precedent, *dependent);
                }
            }
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get cells that depend on the given cell
    pub fn dependents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on
    pub fn precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether a cell reads itself directly
    pub fn is_self_referencing(&self, cell: CellKey) -> bool {
        self.precedents
            .get(&cell)
            .map_or(false, |set| set.contains(&cell))
    }

    /// Detect circular references involving a cell
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        let mut visited = AHashSet::new();
        let mut stack: Vec<CellKey> = self.precedents(cell).collect();
        while let Some(next) = stack.pop() {
            if next == cell {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.precedents(next));
            }
        }
        false
    }

    /// Group cells into strongly connected components, in calculation order
    ///
    /// Every component comes after the components it reads from. A
    /// component with more than one cell, or a single self-referencing
    /// cell, is a circular reference. Ties keep the order of `cells`.
    pub fn calculation_chain(&self, cells: &[CellKey]) -> Vec<Vec<CellKey>> {
        let mut tarjan = Tarjan {
            graph: self,
            index: AHashMap::new(),
            low: AHashMap::new(),
            on_stack: AHashSet::new(),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        for &cell in cells {
            if !tarjan.index.contains_key(&cell) {
                tarjan.visit(cell);
            }
        }
        tarjan.components
    }

    /// Whether a component returned by [`calculation_chain`](Self::calculation_chain) is a cycle
    pub fn is_cycle(&self, component: &[CellKey]) -> bool {
        match component {
            [single] => self.is_self_referencing(*single),
            _ => component.len() > 1,
        }
    }

    /// Number of cells with at least one edge
    pub fn len(&self) -> usize {
        let mut nodes: AHashSet<CellKey> = self.dependents.keys().copied().collect();
        nodes.extend(self.precedents.keys().copied());
        nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty() && self.precedents.is_empty()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}

/// Tarjan's strongly connected components over precedent edges
struct Tarjan<'a> {
    graph: &'a DependencyGraph,
    index: AHashMap<CellKey, usize>,
    low: AHashMap<CellKey, usize>,
    on_stack: AHashSet<CellKey>,
    stack: Vec<CellKey>,
    next_index: usize,
    components: Vec<Vec<CellKey>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, cell: CellKey) {
        self.index.insert(cell, self.next_index);
        self.low.insert(cell, self.next_index);
        self.next_index += 1;
        self.stack.push(cell);
        self.on_stack.insert(cell);

        let mut precedents: Vec<CellKey> = self.graph.precedents(cell).collect();
        precedents.sort();
        for precedent in precedents {
            if !self.index.contains_key(&precedent) {
                self.visit(precedent);
                let low = self.low[&cell].min(self.low[&precedent]);
                self.low.insert(cell, low);
            } else if self.on_stack.contains(&precedent) {
                let low = self.low[&cell].min(self.index[&precedent]);
                self.low.insert(cell, low);
            }
        }

        if self.low[&cell] == self.index[&cell] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(&member);
                component.push(member);
                if member == cell {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::CellRange;

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();

        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);

        graph.add_dependency(a1, b1);

        assert!(graph.dependents(a1).any(|c| c == b1));
        assert!(graph.precedents(b1).any(|c| c == a1));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();

        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);
        let c1 = CellKey::new(0, 0, 2);
        let d1 = CellKey::new(0, 0, 3);

        // A1 -> B1 -> C1 -> A1 (circular), C1 -> D1
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(c1, a1);
        graph.add_dependency(c1, d1);

        assert!(graph.has_circular_reference(a1));
        assert!(graph.has_circular_reference(b1));
        assert!(graph.has_circular_reference(c1));
        assert!(!graph.has_circular_reference(d1));
    }

    #[test]
    fn test_chain_orders_precedents_first() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new(0, 0, 0);
        let a2 = CellKey::new(0, 1, 0);
        let a3 = CellKey::new(0, 2, 0);
        // A3 reads A2, A2 reads A1
        graph.add_dependency(a2, a3);
        graph.add_dependency(a1, a2);

        let chain = graph.calculation_chain(&[a3, a2, a1]);
        assert_eq!(chain, vec![vec![a1], vec![a2], vec![a3]]);
        assert!(chain.iter().all(|c| !graph.is_cycle(c)));
    }

    #[test]
    fn test_chain_isolates_cycles() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);
        let c1 = CellKey::new(0, 0, 2);
        let d1 = CellKey::new(0, 0, 3);
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, a1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(d1, d1);

        let chain = graph.calculation_chain(&[c1, d1]);
        assert_eq!(chain, vec![vec![a1, b1], vec![c1], vec![d1]]);
        assert!(graph.is_cycle(&chain[0]));
        assert!(!graph.is_cycle(&chain[1]));
        assert!(graph.is_cycle(&chain[2]));
    }

    #[test]
    fn test_from_formulas_links_through_ranges() {
        let area = |a1: &str| Area::new(SheetHandle(0), CellRange::parse(a1).unwrap());
        let b1 = CellKey::new(0, 0, 1);
        let b2 = CellKey::new(0, 1, 1);
        let c1 = CellKey::new(0, 0, 2);
        let other_sheet = CellKey::new(1, 0, 1);
        let formulas = vec![
            (b1, vec![area("A1")]),
            (b2, vec![area("A1:A5")]),
            (c1, vec![area("B1:B2")]),
            (other_sheet, vec![]),
        ];
        let graph = DependencyGraph::from_formulas(&formulas);
        let mut precedents: Vec<_> = graph.precedents(c1).collect();
        precedents.sort();
        assert_eq!(precedents, vec![b1, b2]);
        assert_eq!(graph.precedents(b1).count(), 0);
        assert_eq!(graph.dependents(other_sheet).count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn chain_puts_precedents_first(
            edges in proptest::collection::vec((0u32..12, 0u32..12), 0..40)
        ) {
            let cells: Vec<CellKey> = (0..12).map(|row| CellKey::new(0, row, 0)).collect();
            let mut graph = DependencyGraph::new();
            for &(from, to) in &edges {
                graph.add_dependency(cells[from as usize], cells[to as usize]);
            }

            let chain = graph.calculation_chain(&cells);
            let mut position = AHashMap::new();
            for (index, component) in chain.iter().enumerate() {
                for cell in component {
                    proptest::prop_assert!(position.insert(*cell, index).is_none());
                }
            }
            proptest::prop_assert_eq!(position.len(), cells.len());
            for &(from, to) in &edges {
                proptest::prop_assert!(
                    position[&cells[from as usize]] <= position[&cells[to as usize]]
                );
            }
        }
    }
}
