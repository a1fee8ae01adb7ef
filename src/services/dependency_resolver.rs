use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Service for resolving task dependencies and detecting circular dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a TaskId,
    graph: &HashMap<&'a TaskId, Vec<&'a TaskId>>,
    visited: &mut HashSet<&'a TaskId>,
    rec_stack: &mut HashSet<&'a TaskId>,
    path: &mut Vec<&'a TaskId>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                // Cycle detected
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Detect circular dependencies in a set of tasks.
    ///
    /// Returns the tasks on the cycle in dependency order, starting from the
    /// first task (in slice order) found on it.
    pub fn detect_cycle(&self, tasks: &[Task]) -> Option<Vec<TaskId>> {
        // Build adjacency list: task -> its dependencies
        let graph: HashMap<&TaskId, Vec<&TaskId>> = tasks
            .iter()
            .map(|task| (&task.id, task.depends_on.iter().collect()))
            .collect();

        // DFS-based cycle detection, seeded in slice order for determinism
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for task in tasks {
            if !visited.contains(&task.id)
                && detect_cycle_util(&task.id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().cloned().collect());
            }
        }

        None
    }

    /// Perform a stable topological sort on tasks based on dependencies.
    ///
    /// Returns task ids in dependency order (dependencies before dependents).
    /// Among tasks with no ordering constraint between them, slice order is
    /// preserved. A cycle is a hard failure; ties are never broken arbitrarily.
    pub fn topological_sort(&self, tasks: &[Task]) -> DomainResult<Vec<TaskId>> {
        let position: HashMap<&TaskId, usize> =
            tasks.iter().enumerate().map(|(i, t)| (&t.id, i)).collect();

        let mut in_degree: Vec<usize> = vec![0; tasks.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];

        // Build graph and calculate in-degrees
        for (i, task) in tasks.iter().enumerate() {
            for dep_id in &task.depends_on {
                let &dep = position
                    .get(dep_id)
                    .ok_or_else(|| DomainError::TaskNotFound(dep_id.clone()))?;
                dependents[dep].push(i);
                in_degree[i] += 1;
            }
        }

        // Kahn's algorithm with a min-heap on slice position
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut sorted = Vec::with_capacity(tasks.len());

        while let Some(Reverse(node)) = ready.pop() {
            sorted.push(tasks[node].id.clone());
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if sorted.len() != tasks.len() {
            let cycle = self.detect_cycle(tasks).unwrap_or_default();
            return Err(DomainError::CyclicDependency(cycle));
        }

        Ok(sorted)
    }

    /// Calculate the dependency depth for a task
    /// Returns the maximum depth in the dependency chain
    pub fn calculate_depth(&self, task: &Task, all_tasks: &[Task]) -> DomainResult<u32> {
        let task_map: HashMap<&TaskId, &Task> = all_tasks.iter().map(|t| (&t.id, t)).collect();
        let mut visited = HashSet::new();
        calculate_depth_recursive(task, &task_map, &mut visited)
    }

    /// All tasks that depend on `id` directly or transitively, in slice order.
    pub fn transitive_dependents(&self, id: &TaskId, tasks: &[Task]) -> Vec<TaskId> {
        let mut reached: HashSet<&TaskId> = HashSet::new();
        let mut frontier = vec![id];

        while let Some(current) = frontier.pop() {
            for task in tasks {
                if task.depends_on.contains(current) && reached.insert(&task.id) {
                    frontier.push(&task.id);
                }
            }
        }

        tasks
            .iter()
            .filter(|t| reached.contains(&t.id))
            .map(|t| t.id.clone())
            .collect()
    }
}

// Standalone helper for depth calculation
fn calculate_depth_recursive<'a>(
    task: &'a Task,
    task_map: &HashMap<&TaskId, &'a Task>,
    visited: &mut HashSet<&'a TaskId>,
) -> DomainResult<u32> {
    if visited.contains(&task.id) {
        return Err(DomainError::CyclicDependency(
            visited.iter().map(|id| (*id).clone()).collect(),
        ));
    }

    visited.insert(&task.id);

    let mut max_depth = 0;
    for dep_id in &task.depends_on {
        if let Some(&dep_task) = task_map.get(dep_id) {
            let depth = calculate_depth_recursive(dep_task, task_map, visited)?;
            max_depth = max_depth.max(depth + 1);
        }
    }

    visited.remove(&task.id);
    Ok(max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_task(n: usize, dependencies: &[usize]) -> Task {
        let mut task = Task::new(TaskId::numbered(n), "Test", "Description");
        task.depends_on = dependencies.iter().map(|&d| TaskId::numbered(d)).collect();
        task
    }

    #[test]
    fn test_detect_cycle_no_cycle() {
        let resolver = DependencyResolver::new();
        let tasks = vec![create_test_task(1, &[]), create_test_task(2, &[1])];
        assert!(resolver.detect_cycle(&tasks).is_none());
    }

    #[test]
    fn test_detect_cycle_with_cycle() {
        let resolver = DependencyResolver::new();
        let tasks = vec![
            create_test_task(1, &[3]),
            create_test_task(2, &[1]),
            create_test_task(3, &[2]),
            create_test_task(4, &[]),
        ];
        let cycle = resolver.detect_cycle(&tasks).unwrap();
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle[0], TaskId::numbered(1));
        assert!(!cycle.contains(&TaskId::numbered(4)));
    }

    #[test]
    fn test_topological_sort_simple() {
        let resolver = DependencyResolver::new();
        let tasks = vec![
            create_test_task(3, &[2]),
            create_test_task(1, &[]),
            create_test_task(2, &[1]),
        ];
        let sorted = resolver.topological_sort(&tasks).unwrap();
        assert_eq!(
            sorted,
            vec![TaskId::numbered(1), TaskId::numbered(2), TaskId::numbered(3)]
        );
    }

    #[test]
    fn test_topological_sort_is_stable() {
        let resolver = DependencyResolver::new();
        // 4 depends on 1; 2 and 3 are unconstrained and keep slice order
        let tasks = vec![
            create_test_task(1, &[]),
            create_test_task(4, &[1]),
            create_test_task(2, &[]),
            create_test_task(3, &[]),
        ];
        let sorted = resolver.topological_sort(&tasks).unwrap();
        assert_eq!(
            sorted,
            vec![
                TaskId::numbered(1),
                TaskId::numbered(4),
                TaskId::numbered(2),
                TaskId::numbered(3)
            ]
        );
    }

    #[test]
    fn test_topological_sort_with_cycle() {
        let resolver = DependencyResolver::new();
        let tasks = vec![create_test_task(1, &[2]), create_test_task(2, &[1])];
        let err = resolver.topological_sort(&tasks).unwrap_err();
        assert!(matches!(err, DomainError::CyclicDependency(path) if path.len() == 2));
    }

    #[test]
    fn test_calculate_depth() {
        let resolver = DependencyResolver::new();
        let task1 = create_test_task(1, &[]);
        let task2 = create_test_task(2, &[1]);
        let task3 = create_test_task(3, &[2]);
        let all_tasks = vec![task1.clone(), task2.clone(), task3.clone()];

        assert_eq!(resolver.calculate_depth(&task1, &all_tasks).unwrap(), 0);
        assert_eq!(resolver.calculate_depth(&task2, &all_tasks).unwrap(), 1);
        assert_eq!(resolver.calculate_depth(&task3, &all_tasks).unwrap(), 2);
    }

    #[test]
    fn test_transitive_dependents() {
        let resolver = DependencyResolver::new();
        let tasks = vec![
            create_test_task(1, &[]),
            create_test_task(2, &[1]),
            create_test_task(3, &[2]),
            create_test_task(4, &[]),
        ];
        assert_eq!(
            resolver.transitive_dependents(&TaskId::numbered(1), &tasks),
            vec![TaskId::numbered(2), TaskId::numbered(3)]
        );
        assert!(resolver
            .transitive_dependents(&TaskId::numbered(4), &tasks)
            .is_empty());
    }
}
