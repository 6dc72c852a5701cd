/// Story graph analysis: reachability, cycles and endings.
///
/// Structural defects are rejected by the catalog itself. The checks here
/// cover what a valid graph may still get wrong by convention.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt;

use crate::core::catalog::StoryGraph;
use crate::schema::scene::SceneId;
use crate::schema::theme::ThemeKey;

/// A convention a story graph breaks without being invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintWarning {
    /// Scene that no path from the start reaches.
    Unreachable(SceneId),
    /// A loop of scenes, listed in traversal order starting and ending on
    /// the same scene.
    Cycle(Vec<SceneId>),
    /// Every path from the start loops forever.
    NoReachableEnding,
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintWarning::Unreachable(scene) => {
                write!(f, "scene '{scene}' is unreachable from the start")
            }
            LintWarning::Cycle(path) => {
                let names: Vec<&str> = path.iter().map(SceneId::as_str).collect();
                write!(f, "cycle: {}", names.join(" -> "))
            }
            LintWarning::NoReachableEnding => write!(f, "no ending is reachable from the start"),
        }
    }
}

/// Findings for one theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintReport {
    pub theme: ThemeKey,
    pub scene_count: usize,
    /// Ending scenes reachable from the start, in authoring order.
    pub reachable_endings: Vec<SceneId>,
    pub warnings: Vec<LintWarning>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Scenes reachable from the start scene, in breadth-first order.
pub fn reachable_scenes(graph: &StoryGraph) -> Vec<SceneId> {
    let start = SceneId::start();
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    if graph.scene(&start).is_some() {
        seen.insert(start.clone());
        queue.push_back(start);
    }

    while let Some(id) = queue.pop_front() {
        if let Some(scene) = graph.scene(&id) {
            for choice in &scene.choices {
                if seen.insert(choice.target.clone()) {
                    queue.push_back(choice.target.clone());
                }
            }
        }
        order.push(id);
    }
    order
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

/// Every distinct back edge found by a depth-first walk from the start,
/// reported as the loop it closes.
pub fn find_cycles(graph: &StoryGraph) -> Vec<Vec<SceneId>> {
    let mut marks: FxHashMap<SceneId, Mark> = FxHashMap::default();
    let mut path: Vec<SceneId> = Vec::new();
    let mut cycles = Vec::new();

    // Iterative DFS: (scene, index of the next choice to follow).
    let start = SceneId::start();
    if graph.scene(&start).is_none() {
        return cycles;
    }
    let mut stack: Vec<(SceneId, usize)> = vec![(start.clone(), 0)];
    marks.insert(start.clone(), Mark::Open);
    path.push(start);

    while let Some((id, next)) = stack.last().cloned() {
        let targets = graph
            .scene(&id)
            .map(|s| s.choices.as_slice())
            .unwrap_or(&[]);

        if next >= targets.len() {
            marks.insert(id, Mark::Done);
            stack.pop();
            path.pop();
            continue;
        }
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }

        let target = &targets[next].target;
        match marks.get(target).copied() {
            Some(Mark::Open) => {
                if let Some(pos) = path.iter().position(|p| p == target) {
                    let mut cycle = path[pos..].to_vec();
                    cycle.push(target.clone());
                    cycles.push(cycle);
                }
            }
            Some(Mark::Done) => {}
            None => {
                marks.insert(target.clone(), Mark::Open);
                path.push(target.clone());
                stack.push((target.clone(), 0));
            }
        }
    }
    cycles
}

/// Run every check on a graph.
pub fn lint_graph(graph: &StoryGraph) -> LintReport {
    let reachable: FxHashSet<SceneId> = reachable_scenes(graph).into_iter().collect();
    let mut warnings = Vec::new();

    for scene in graph.scenes() {
        if !reachable.contains(&scene.id) {
            warnings.push(LintWarning::Unreachable(scene.id.clone()));
        }
    }

    warnings.extend(find_cycles(graph).into_iter().map(LintWarning::Cycle));

    let reachable_endings: Vec<SceneId> = graph
        .scenes()
        .filter(|s| s.is_ending && reachable.contains(&s.id))
        .map(|s| s.id.clone())
        .collect();
    if reachable_endings.is_empty() {
        warnings.push(LintWarning::NoReachableEnding);
    }

    LintReport {
        theme: graph.theme().key.clone(),
        scene_count: graph.len(),
        reachable_endings,
        warnings,
    }
}
