//! Task decomposition via the capability classifier.
//!
//! The classifier returns a JSON array of subtask records whose dependencies
//! are zero-based indexes of earlier records. The decomposer validates the
//! whole plan before constructing anything; a malformed response aborts the
//! decomposition with no partial subtask set.

use overmind_core::{
    DecomposeError, OvermindError, OvermindResult, SubTask, SubTaskId, Task, TaskStatus,
};
use overmind_llm::CapabilityClassifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One subtask record as produced by the classifier.
#[derive(Debug, Deserialize)]
struct SubtaskRecord {
    description: String,
    #[serde(default)]
    required_capabilities: Vec<String>,
    /// Zero-based indexes of earlier records this one depends on
    #[serde(default)]
    dependencies: Vec<usize>,
}

/// Splits task descriptions into dependency-ordered subtask plans.
pub struct TaskDecomposer {
    classifier: Arc<dyn CapabilityClassifier>,
}

impl TaskDecomposer {
    /// Create a decomposer backed by the given classifier.
    pub fn new(classifier: Arc<dyn CapabilityClassifier>) -> Self {
        Self { classifier }
    }

    /// Decompose a description into a pending task with a subtask DAG.
    ///
    /// # Errors
    /// - `DecomposeError::InvalidResponse` on malformed classifier output
    ///   or a dependency index that is out of range or not an earlier record
    /// - `DecomposeError::EmptyPlan` when the plan has no subtasks
    pub fn decompose_task(&self, description: &str) -> OvermindResult<Task> {
        let response = self.classifier.decompose(description)?;
        let records: Vec<SubtaskRecord> =
            serde_json::from_str(&response).map_err(|err| DecomposeError::InvalidResponse {
                reason: err.to_string(),
            })?;
        if records.is_empty() {
            return Err(OvermindError::Decompose(DecomposeError::EmptyPlan));
        }

        // Indexes must reference strictly earlier records, which also makes
        // cycles unrepresentable in classifier output.
        for (position, record) in records.iter().enumerate() {
            for &dep in &record.dependencies {
                if dep >= position {
                    return Err(OvermindError::Decompose(DecomposeError::InvalidResponse {
                        reason: format!(
                            "subtask {position} depends on index {dep}, which is not an earlier record"
                        ),
                    }));
                }
            }
        }

        let subtasks: Vec<SubTask> = records
            .iter()
            .map(|r| SubTask::new(&r.description, r.required_capabilities.clone()))
            .collect();
        let ids: Vec<SubTaskId> = subtasks.iter().map(|s| s.subtask_id).collect();
        let subtasks = subtasks
            .into_iter()
            .zip(records.iter())
            .map(|(subtask, record)| {
                subtask.with_dependencies(
                    record.dependencies.iter().map(|&dep| ids[dep]).collect(),
                )
            })
            .collect::<Vec<_>>();

        debug!(subtasks = subtasks.len(), "decomposed task");
        Ok(Task::new(description, "decomposed").with_subtasks(subtasks))
    }

    /// Every subtask that is pending with all dependencies completed.
    ///
    /// Recomputed fresh on each call. Unsatisfiable dependencies (a cycle
    /// smuggled in by hand-built tasks, or a failed dependency) simply never
    /// become ready.
    pub fn next_subtasks<'a>(&self, task: &'a Task) -> Vec<&'a SubTask> {
        let statuses: HashMap<SubTaskId, TaskStatus> = task
            .subtasks
            .iter()
            .map(|s| (s.subtask_id, s.status))
            .collect();
        task.subtasks
            .iter()
            .filter(|s| s.status == TaskStatus::Pending)
            .filter(|s| {
                s.dependencies
                    .iter()
                    .all(|dep| statuses.get(dep) == Some(&TaskStatus::Completed))
            })
            .collect()
    }

    /// Set a subtask's status and recompute the task's aggregate status.
    ///
    /// Aggregate precedence: all completed → completed; else any failed →
    /// failed (failed outranks in-progress); else any in-progress →
    /// in-progress; else pending.
    ///
    /// # Errors
    /// `DecomposeError::UnknownSubtask` when the id is not in the task.
    pub fn update_subtask_status(
        &self,
        task: &mut Task,
        subtask_id: SubTaskId,
        status: TaskStatus,
        result: Option<&str>,
    ) -> OvermindResult<()> {
        let task_id = task.task_id;
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|s| s.subtask_id == subtask_id)
            .ok_or(DecomposeError::UnknownSubtask {
                task_id,
                subtask_id,
            })?;
        subtask.status = status;
        if let Some(result) = result {
            subtask.result = Some(result.to_string());
        }

        let all_completed = task
            .subtasks
            .iter()
            .all(|s| s.status == TaskStatus::Completed);
        let any_failed = task.subtasks.iter().any(|s| s.status == TaskStatus::Failed);
        let any_in_progress = task
            .subtasks
            .iter()
            .any(|s| s.status == TaskStatus::InProgress);

        if all_completed {
            let combined = task
                .subtasks
                .iter()
                .filter_map(|s| s.result.as_deref())
                .collect::<Vec<_>>()
                .join("\n");
            task.mark_started();
            task.mark_completed(&combined);
        } else if any_failed {
            task.mark_started();
            task.mark_failed("one or more subtasks failed");
        } else if any_in_progress {
            task.mark_started();
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDecomposer").finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use overmind_llm::ScriptedClassifier;

    fn decomposer_with(plan: &str) -> TaskDecomposer {
        let classifier = Arc::new(ScriptedClassifier::new());
        classifier.push_decomposition(plan);
        TaskDecomposer::new(classifier)
    }

    fn three_step_plan() -> &'static str {
        r#"[
            {"description": "gather data", "required_capabilities": ["research"]},
            {"description": "analyze data", "required_capabilities": ["analysis"], "dependencies": [0]},
            {"description": "write report", "required_capabilities": ["writing"], "dependencies": [0, 1]}
        ]"#
    }

    #[test]
    fn test_decompose_builds_pending_dag() {
        let decomposer = decomposer_with(three_step_plan());
        let task = decomposer.decompose_task("produce a report").unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.subtasks.len(), 3);
        assert!(task.subtasks.iter().all(|s| s.status == TaskStatus::Pending));
        assert_eq!(task.subtasks[1].dependencies, vec![task.subtasks[0].subtask_id]);
        assert_eq!(
            task.subtasks[2].dependencies,
            vec![task.subtasks[0].subtask_id, task.subtasks[1].subtask_id]
        );
    }

    #[test]
    fn test_decompose_rejects_malformed_json() {
        let decomposer = decomposer_with("not json at all");
        let err = decomposer.decompose_task("anything").unwrap_err();
        assert!(matches!(
            err,
            OvermindError::Decompose(DecomposeError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_decompose_rejects_empty_plan() {
        let decomposer = decomposer_with("[]");
        let err = decomposer.decompose_task("anything").unwrap_err();
        assert!(matches!(
            err,
            OvermindError::Decompose(DecomposeError::EmptyPlan)
        ));
    }

    #[test]
    fn test_decompose_rejects_forward_dependency() {
        let decomposer = decomposer_with(
            r#"[
                {"description": "a", "dependencies": [1]},
                {"description": "b"}
            ]"#,
        );
        let err = decomposer.decompose_task("anything").unwrap_err();
        assert!(matches!(
            err,
            OvermindError::Decompose(DecomposeError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_readiness_frontier_advances_with_completions() {
        let decomposer = decomposer_with(three_step_plan());
        let mut task = decomposer.decompose_task("produce a report").unwrap();
        let (a, b, c) = (
            task.subtasks[0].subtask_id,
            task.subtasks[1].subtask_id,
            task.subtasks[2].subtask_id,
        );

        let ready: Vec<_> = decomposer.next_subtasks(&task).iter().map(|s| s.subtask_id).collect();
        assert_eq!(ready, vec![a]);

        decomposer
            .update_subtask_status(&mut task, a, TaskStatus::Completed, Some("data"))
            .unwrap();
        let ready: Vec<_> = decomposer.next_subtasks(&task).iter().map(|s| s.subtask_id).collect();
        assert_eq!(ready, vec![b]);

        decomposer
            .update_subtask_status(&mut task, b, TaskStatus::Completed, Some("analysis"))
            .unwrap();
        let ready: Vec<_> = decomposer.next_subtasks(&task).iter().map(|s| s.subtask_id).collect();
        assert_eq!(ready, vec![c]);
    }

    #[test]
    fn test_aggregate_failed_outranks_in_progress() {
        let decomposer = decomposer_with(three_step_plan());
        let mut task = decomposer.decompose_task("produce a report").unwrap();
        let (a, b, c) = (
            task.subtasks[0].subtask_id,
            task.subtasks[1].subtask_id,
            task.subtasks[2].subtask_id,
        );

        decomposer
            .update_subtask_status(&mut task, a, TaskStatus::Completed, None)
            .unwrap();
        decomposer
            .update_subtask_status(&mut task, b, TaskStatus::InProgress, None)
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        decomposer
            .update_subtask_status(&mut task, c, TaskStatus::Failed, None)
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_aggregate_completed_when_all_complete() {
        let decomposer = decomposer_with(three_step_plan());
        let mut task = decomposer.decompose_task("produce a report").unwrap();
        let ids: Vec<_> = task.subtasks.iter().map(|s| s.subtask_id).collect();
        for (i, id) in ids.iter().enumerate() {
            decomposer
                .update_subtask_status(&mut task, *id, TaskStatus::Completed, Some(&format!("r{i}")))
                .unwrap();
        }
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("r0\nr1\nr2"));
    }

    #[test]
    fn test_update_unknown_subtask_fails() {
        let decomposer = decomposer_with(three_step_plan());
        let mut task = decomposer.decompose_task("produce a report").unwrap();
        let err = decomposer
            .update_subtask_status(
                &mut task,
                uuid::Uuid::now_v7(),
                TaskStatus::Completed,
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            OvermindError::Decompose(DecomposeError::UnknownSubtask { .. })
        ));
    }
}
