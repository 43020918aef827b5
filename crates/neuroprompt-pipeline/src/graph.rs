//! Stage graph validation and topological ordering
//!
//! A [`PipelineGraph`] is only constructed from a valid stage set: unique
//! names, dependencies that resolve to declared stages, and no cycles. The
//! order is derived with Kahn's algorithm, level by level, using declaration
//! order as the tie-break so identical graphs always run identically.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use neuroprompt_utils::error::PipelineError;

use crate::stage::Stage;

struct Node {
    stage: Arc<dyn Stage>,
    deps: Vec<String>,
}

/// Validated, immutable stage graph
pub struct PipelineGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    /// Indices into `nodes`, grouped by rank
    ranks: Vec<Vec<usize>>,
}

impl fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("ranks", &self.ranks())
            .finish()
    }
}

impl PipelineGraph {
    /// Validate `stages` and derive their execution order.
    ///
    /// # Errors
    ///
    /// - `DuplicateStage` if two stages share a name
    /// - `UnknownDependency` if a stage depends on a name not in `stages`
    /// - `Cycle` if the dependencies cannot be ordered; a stage depending on
    ///   itself is a cycle. The error lists every stage that could not be
    ///   placed, in declaration order.
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self, PipelineError> {
        let mut index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.name().to_string(), i).is_some() {
                return Err(PipelineError::DuplicateStage {
                    stage: stage.name().to_string(),
                });
            }
        }

        let mut nodes = Vec::with_capacity(stages.len());
        for stage in stages {
            let mut deps: Vec<String> = Vec::new();
            for dep in stage.dependencies() {
                if !index.contains_key(dep) {
                    return Err(PipelineError::UnknownDependency {
                        stage: stage.name().to_string(),
                        dependency: dep.clone(),
                    });
                }
                if !deps.contains(dep) {
                    deps.push(dep.clone());
                }
            }
            nodes.push(Node { stage, deps });
        }

        let ranks = compute_ranks(&nodes)?;
        Ok(Self {
            nodes,
            index,
            ranks,
        })
    }

    /// Stage names grouped by rank. Every stage in a rank depends only on
    /// stages of earlier ranks; within a rank, names are in declaration order.
    #[must_use]
    pub fn ranks(&self) -> Vec<Vec<String>> {
        self.ranks
            .iter()
            .map(|rank| rank.iter().map(|&i| self.name_at(i).to_string()).collect())
            .collect()
    }

    /// Flattened execution order
    #[must_use]
    pub fn order(&self) -> Vec<String> {
        self.ranks.iter().flatten().map(|&i| self.name_at(i).to_string()).collect()
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.index.get(name).map(|&i| &self.nodes[i].stage)
    }

    /// De-duplicated dependencies of a stage, in declared order
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.index.get(name).map(|&i| self.nodes[i].deps.as_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn rank_indices(&self) -> &[Vec<usize>] {
        &self.ranks
    }

    pub(crate) fn stage_at(&self, i: usize) -> &Arc<dyn Stage> {
        &self.nodes[i].stage
    }

    pub(crate) fn deps_at(&self, i: usize) -> &[String] {
        &self.nodes[i].deps
    }

    fn name_at(&self, i: usize) -> &str {
        self.nodes[i].stage.name()
    }
}

fn compute_ranks(nodes: &[Node]) -> Result<Vec<Vec<usize>>, PipelineError> {
    let mut placed: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut remaining: Vec<usize> = (0..nodes.len()).collect();
    let mut ranks = Vec::new();

    while !remaining.is_empty() {
        // Only stages placed in earlier ranks count, so a rank never contains
        // a stage together with one of its dependencies.
        let (ready, blocked): (Vec<usize>, Vec<usize>) = remaining
            .iter()
            .partition(|&&i| nodes[i].deps.iter().all(|d| placed.contains(d.as_str())));

        if ready.is_empty() {
            return Err(PipelineError::Cycle {
                stages: blocked
                    .iter()
                    .map(|&i| nodes[i].stage.name().to_string())
                    .collect(),
            });
        }

        placed.extend(ready.iter().map(|&i| nodes[i].stage.name()));
        ranks.push(ready);
        remaining = blocked;
    }

    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageInputs;
    use async_trait::async_trait;
    use proptest::prelude::*;

    struct Named {
        name: String,
        deps: Vec<String>,
    }

    #[async_trait]
    impl Stage for Named {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        async fn run(&self, _inputs: &StageInputs) -> anyhow::Result<String> {
            Ok(self.name.clone())
        }
    }

    fn stage(name: &str, deps: &[&str]) -> Arc<dyn Stage> {
        Arc::new(Named {
            name: name.to_string(),
            deps: deps.iter().map(|d| (*d).to_string()).collect(),
        })
    }

    fn diamond() -> Vec<Arc<dyn Stage>> {
        vec![
            stage("research", &[]),
            stage("generate", &["research"]),
            stage("critique", &["generate"]),
            stage("optimize", &["generate", "critique"]),
        ]
    }

    #[test]
    fn test_diamond_order() {
        let graph = PipelineGraph::new(diamond()).unwrap();
        assert_eq!(graph.order(), vec!["research", "generate", "critique", "optimize"]);
        assert_eq!(graph.ranks().len(), 4);
        assert_eq!(
            graph.dependencies("optimize").unwrap(),
            &["generate".to_string(), "critique".to_string()]
        );
    }

    #[test]
    fn test_declaration_order_breaks_ties_within_a_rank() {
        let graph = PipelineGraph::new(vec![
            stage("root", &[]),
            stage("zeta", &["root"]),
            stage("alpha", &["root"]),
            stage("join", &["alpha", "zeta"]),
        ])
        .unwrap();

        assert_eq!(
            graph.ranks(),
            vec![vec!["root"], vec!["zeta", "alpha"], vec!["join"]]
        );
    }

    #[test]
    fn test_later_declared_dependency_is_ordered_first() {
        let graph = PipelineGraph::new(vec![stage("b", &["a"]), stage("a", &[])]).unwrap();
        assert_eq!(graph.order(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = PipelineGraph::new(vec![stage("a", &[]), stage("a", &[])]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage { ref stage } if stage == "a"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = PipelineGraph::new(vec![stage("a", &[]), stage("b", &["ghost"])]).unwrap_err();
        match err {
            PipelineError::UnknownDependency { stage, dependency } => {
                assert_eq!(stage, "b");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_two_stage_cycle_rejected() {
        let err = PipelineGraph::new(vec![stage("a", &["b"]), stage("b", &["a"])]).unwrap_err();
        match err {
            PipelineError::Cycle { stages } => assert_eq!(stages, vec!["a", "b"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = PipelineGraph::new(vec![stage("a", &[]), stage("loop", &["loop"])]).unwrap_err();
        match err {
            PipelineError::Cycle { stages } => assert_eq!(stages, vec!["loop"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_dependency_is_collapsed() {
        let graph =
            PipelineGraph::new(vec![stage("a", &[]), stage("b", &["a", "a"])]).unwrap();
        assert_eq!(graph.dependencies("b").unwrap(), &["a".to_string()]);
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = PipelineGraph::new(Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.order().is_empty());
    }

    proptest! {
        // Random DAGs (edges only point to lower indices), declared in a
        // shuffled order: every stage appears exactly once and after its deps.
        #[test]
        fn prop_order_respects_dependencies(
            edges in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), 1..10),
            seed in any::<u64>(),
        ) {
            let n = edges.len();
            let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(n);
            let mut declared: Vec<usize> = (0..n).collect();
            declared.sort_by_key(|i| (*i as u64).wrapping_mul(seed | 1).rotate_left(17));

            for &i in &declared {
                let deps: Vec<String> = if i == 0 {
                    Vec::new()
                } else {
                    edges[i].iter().map(|ix| format!("s{}", ix.index(i))).collect()
                };
                stages.push(Arc::new(Named { name: format!("s{i}"), deps }));
            }

            let graph = PipelineGraph::new(stages).unwrap();
            let order = graph.order();
            prop_assert_eq!(order.len(), n);

            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(p, name)| (name.as_str(), p)).collect();
            for name in &order {
                for dep in graph.dependencies(name).unwrap() {
                    prop_assert!(position[dep.as_str()] < position[name.as_str()]);
                }
            }
        }
    }
}
