//! Task graph construction.
//!
//! Converts extracted requirements into tasks with explicit dependency
//! edges and fixes a deterministic topological execution order. Edges come
//! from `[after: key]` tags, from backticked references to another task's
//! artifact key, and from the setup → core → polish stage policy. A cycle is
//! a construction error, never resolved by picking an arbitrary order.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PlanningConfig, Requirement, RequirementId, Stage, Task, TaskId};
use crate::domain::ports::GroupingStrategy;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::grouping::strategy_for;

/// An acyclic set of tasks with a fixed execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGraph {
    /// Tasks in document order
    pub tasks: Vec<Task>,
    /// Topological order; unconstrained tasks keep document order
    pub order: Vec<TaskId>,
}

impl TaskGraph {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Length of the longest dependency chain below a task (0 = no dependencies).
    pub fn depth(&self, id: &TaskId) -> DomainResult<u32> {
        let task = self
            .task(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        DependencyResolver::new().calculate_depth(task, &self.tasks)
    }

    /// Every task that transitively waits on `id`.
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        DependencyResolver::new().transitive_dependents(id, &self.tasks)
    }
}

/// Builds task graphs under a planning policy.
pub struct TaskGraphBuilder {
    policy: PlanningConfig,
    strategy: Box<dyn GroupingStrategy>,
    resolver: DependencyResolver,
}

impl TaskGraphBuilder {
    /// Builder using the grouping strategy named by the policy.
    pub fn new(policy: PlanningConfig) -> Self {
        let strategy = strategy_for(policy.grouping);
        Self::with_strategy(policy, strategy)
    }

    pub fn with_strategy(policy: PlanningConfig, strategy: Box<dyn GroupingStrategy>) -> Self {
        Self {
            policy,
            strategy,
            resolver: DependencyResolver::new(),
        }
    }

    pub fn policy(&self) -> &PlanningConfig {
        &self.policy
    }

    /// Build the task graph for a sequence of requirements.
    #[instrument(skip_all, fields(requirements = requirements.len(), strategy = self.strategy.name()))]
    pub fn build(&self, requirements: &[Requirement]) -> DomainResult<TaskGraph> {
        let drafts = self.strategy.group(requirements);

        let mut tasks: Vec<Task> = drafts
            .iter()
            .enumerate()
            .map(|(i, draft)| {
                let members = draft.requirements.iter().map(|&r| &requirements[r]);
                let estimate = members
                    .clone()
                    .map(|r| r.points(self.policy.default_points))
                    .sum();
                let mut task = Task::new(
                    TaskId::numbered(i + 1),
                    draft.title.clone(),
                    draft.description.clone(),
                )
                .with_requirements(members.map(|r| r.id.clone()))
                .with_estimate(estimate)
                .with_stage(draft.stage);
                task.key.clone_from(&draft.key);
                task.handles_external_input = draft.handles_external_input;
                task
            })
            .collect();

        let keys = index_keys(&tasks)?;

        // (dependent, dependency) pairs by task position
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (i, draft) in drafts.iter().enumerate() {
            for req in draft.requirements.iter().map(|&r| &requirements[r]) {
                for reference in &req.tags.after {
                    let &j = keys.get(reference.as_str()).ok_or_else(|| {
                        DomainError::AmbiguousDependency {
                            reference: reference.clone(),
                            reason: "no task declares this key".to_string(),
                        }
                    })?;
                    if j == i {
                        return Err(DomainError::AmbiguousDependency {
                            reference: reference.clone(),
                            reason: format!("{} references its own key", tasks[i].id),
                        });
                    }
                    edges.push((i, j));
                }
                for artifact in backtick_spans(&req.text) {
                    if let Some(&j) = keys.get(artifact) {
                        if j != i {
                            edges.push((i, j));
                        }
                    }
                }
            }
        }
        edges.extend(stage_edges(&tasks));

        for (dependent, dependency) in edges {
            let dependency_id = tasks[dependency].id.clone();
            tasks[dependent].depends_on.insert(dependency_id);
        }

        let tasks = self.split_all(tasks, requirements);
        let order = self.resolver.topological_sort(&tasks).map_err(|err| {
            warn!(error = %err, "task graph rejected");
            err
        })?;

        debug!(tasks = tasks.len(), "task graph built");
        Ok(TaskGraph { tasks, order })
    }

    /// Split a task whose estimate exceeds the policy bound into a chain of
    /// child tasks. Returns the task unchanged when it fits.
    ///
    /// The first child inherits the task's dependencies; each later child
    /// depends on the one before it.
    pub fn split_oversized(&self, task: Task, requirements: &[Requirement]) -> Vec<Task> {
        let bound = self.policy.max_task_points.max(1);
        if task.estimate <= bound {
            return vec![task];
        }

        let chunks = self.chunk(&task, requirements, bound);
        let total = chunks.len();
        debug!(task_id = %task.id, estimate = task.estimate, parts = total, "splitting oversized task");

        let mut children = Vec::with_capacity(total);
        let mut previous: Option<TaskId> = None;
        for (k, (requirement_ids, points)) in chunks.into_iter().enumerate() {
            let mut child = task.clone();
            child.id = task.id.child(k + 1);
            child.title = format!("{} (part {}/{total})", task.title, k + 1);
            let texts: Vec<&str> = requirement_ids
                .iter()
                .filter_map(|id| requirements.iter().find(|r| &r.id == id))
                .map(|r| r.text.as_str())
                .collect();
            if !texts.is_empty() {
                child.description = texts.join("\n");
            }
            child.requirement_ids = requirement_ids;
            child.estimate = points;
            child.parent = Some(task.id.clone());
            if let Some(prev) = previous.take() {
                child.depends_on = BTreeSet::from([prev]);
            }
            previous = Some(child.id.clone());
            children.push(child);
        }
        children
    }

    /// Split every oversized task and point dependents of a split task at its
    /// last child.
    fn split_all(&self, tasks: Vec<Task>, requirements: &[Requirement]) -> Vec<Task> {
        let mut result = Vec::with_capacity(tasks.len());
        let mut renamed: HashMap<TaskId, TaskId> = HashMap::new();

        for task in tasks {
            let original = task.id.clone();
            let parts = self.split_oversized(task, requirements);
            if parts.len() > 1 {
                if let Some(last) = parts.last() {
                    renamed.insert(original, last.id.clone());
                }
            }
            result.extend(parts);
        }

        if !renamed.is_empty() {
            for task in &mut result {
                task.depends_on = task
                    .depends_on
                    .iter()
                    .map(|dep| renamed.get(dep).unwrap_or(dep).clone())
                    .collect();
            }
        }
        result
    }

    /// Partition a task's points into chunks no larger than `bound`.
    fn chunk(
        &self,
        task: &Task,
        requirements: &[Requirement],
        bound: u32,
    ) -> Vec<(Vec<RequirementId>, u32)> {
        let weights: Vec<(Option<RequirementId>, u32)> = if task.requirement_ids.is_empty() {
            vec![(None, task.estimate)]
        } else {
            task.requirement_ids
                .iter()
                .map(|id| {
                    let points = requirements
                        .iter()
                        .find(|r| &r.id == id)
                        .map_or(self.policy.default_points, |r| {
                            r.points(self.policy.default_points)
                        });
                    (Some(id.clone()), points)
                })
                .collect()
        };

        let mut chunks: Vec<(Vec<RequirementId>, u32)> = Vec::new();
        let mut current: (Vec<RequirementId>, u32) = (Vec::new(), 0);

        for (id, points) in weights {
            if points > bound {
                if current.1 > 0 {
                    chunks.push(std::mem::take(&mut current));
                }
                let mut remaining = points;
                while remaining > 0 {
                    let part = remaining.min(bound);
                    chunks.push((id.iter().cloned().collect(), part));
                    remaining -= part;
                }
                continue;
            }
            if current.1 + points > bound {
                chunks.push(std::mem::take(&mut current));
            }
            current.0.extend(id);
            current.1 += points;
        }
        if current.1 > 0 {
            chunks.push(current);
        }
        chunks
    }
}

/// Map artifact keys to task positions. A key declared twice is ambiguous.
fn index_keys(tasks: &[Task]) -> DomainResult<HashMap<String, usize>> {
    let mut keys: HashMap<String, usize> = HashMap::new();
    for (i, task) in tasks.iter().enumerate() {
        let Some(key) = &task.key else { continue };
        if let Some(&existing) = keys.get(key) {
            return Err(DomainError::AmbiguousDependency {
                reference: key.clone(),
                reason: format!("declared by both {} and {}", tasks[existing].id, task.id),
            });
        }
        keys.insert(key.clone(), i);
    }
    Ok(keys)
}

/// Ordering policy edges: core after setup, polish after core (or setup).
fn stage_edges(tasks: &[Task]) -> Vec<(usize, usize)> {
    let in_stage = |stage: Stage| -> Vec<usize> {
        tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.stage == stage)
            .map(|(i, _)| i)
            .collect()
    };
    let setup = in_stage(Stage::Setup);
    let core = in_stage(Stage::Core);
    let polish = in_stage(Stage::Polish);
    let before_polish = if core.is_empty() { &setup } else { &core };

    let mut edges = Vec::new();
    for &c in &core {
        edges.extend(setup.iter().map(|&s| (c, s)));
    }
    for &p in &polish {
        edges.extend(before_polish.iter().map(|&b| (p, b)));
    }
    edges
}

/// Contents of backticked spans.
fn backtick_spans(text: &str) -> impl Iterator<Item = &str> {
    text.split('`')
        .skip(1)
        .step_by(2)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
