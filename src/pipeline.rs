//! Pipeline orchestrator — a directed acyclic graph of stages.
//!
//! Stages are declared once with explicit dependency lists; the builder
//! validates the graph (unique ids, known dependencies, no cycles) at
//! construction time, turning wiring mistakes into immediate errors
//! instead of runtime ordering bugs.
//!
//! Execution walks the graph in topological order. A stage receives the
//! outputs of exactly its dependencies — never output of unrelated
//! stages — plus the failure notes of any dependency that did not
//! complete. A failed or timed-out stage degrades the run; dependents
//! still execute with partial inputs, so the terminal stage always gets
//! a chance to produce a best-effort result.

use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PipelineError;

/// Default per-stage wall-clock budget.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifecycle of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Ready,
    Running,
    Done,
    Failed,
}

/// A recorded stage failure, passed downstream as an explicit note.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: String,
    pub reason: String,
}

impl StageFailure {
    /// Inline notice form used in degraded narrative output.
    pub fn notice(&self) -> String {
        format!("[stage {} unavailable: {}]", self.stage, self.reason)
    }
}

/// What a stage's work function sees: the outputs of its dependencies
/// (keyed by stage id, successes only) and the failure notes of the
/// dependencies that did not produce output.
pub struct StageContext<T> {
    inputs: Vec<(String, T)>,
    pub upstream_failures: Vec<StageFailure>,
}

impl<T> StageContext<T> {
    /// Dependency outputs in declaration order. A failed dependency is
    /// absent here and present in `upstream_failures` instead.
    pub fn inputs(&self) -> impl Iterator<Item = &T> {
        self.inputs.iter().map(|(_, v)| v)
    }

    /// Output of one named dependency, if it completed.
    pub fn input_of(&self, stage: &str) -> Option<&T> {
        self.inputs
            .iter()
            .find(|(id, _)| id == stage)
            .map(|(_, v)| v)
    }

    /// First available input — the common case for single-dependency
    /// stages and roots (which see the run's initial input).
    pub fn first(&self) -> Option<&T> {
        self.inputs.first().map(|(_, v)| v)
    }
}

type StageWork<T> = Box<
    dyn Fn(StageContext<T>) -> Pin<Box<dyn Future<Output = Result<T, String>> + Send>>
        + Send
        + Sync,
>;

struct Stage<T> {
    id: String,
    deps: Vec<String>,
    work: StageWork<T>,
}

// ── Builder ─────────────────────────────────────────────────────────

/// Declares stages; `build` validates the graph.
pub struct PipelineBuilder<T> {
    stages: Vec<Stage<T>>,
    stage_timeout: Duration,
}

impl<T: Clone + Send + 'static> PipelineBuilder<T> {
    /// Add a stage. `deps` are ids of stages whose output this stage
    /// consumes; they must be declared (in any order) before `build`.
    pub fn stage<F, Fut>(mut self, id: &str, deps: &[&str], work: F) -> Self
    where
        F: Fn(StageContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        self.stages.push(Stage {
            id: id.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            work: Box::new(move |ctx| Box::pin(work(ctx))),
        });
        self
    }

    /// Override the per-stage wall-clock budget.
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Validate the graph and fix the execution order.
    pub fn build(self) -> Result<Pipeline<T>, PipelineError> {
        let ids: HashSet<&str> = {
            let mut seen = HashSet::new();
            for stage in &self.stages {
                if !seen.insert(stage.id.as_str()) {
                    return Err(PipelineError::DuplicateStage {
                        stage: stage.id.clone(),
                    });
                }
            }
            seen
        };

        for stage in &self.stages {
            for dep in &stage.deps {
                if !ids.contains(dep.as_str()) {
                    return Err(PipelineError::UnknownDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    });
                }
                if dep == &stage.id {
                    return Err(PipelineError::Cycle {
                        stage: stage.id.clone(),
                    });
                }
            }
        }

        let order = topological_order(&self.stages)?;
        Ok(Pipeline {
            stages: self.stages,
            order,
            stage_timeout: self.stage_timeout,
        })
    }
}

/// Kahn's algorithm; any leftover stage is on a cycle.
fn topological_order<T>(stages: &[Stage<T>]) -> Result<Vec<usize>, PipelineError> {
    let index: HashMap<&str, usize> = stages
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; stages.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for (i, stage) in stages.iter().enumerate() {
        for dep in &stage.deps {
            let d = index[dep.as_str()];
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &j in &dependents[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                queue.push_back(j);
            }
        }
    }

    if order.len() != stages.len() {
        let stuck = (0..stages.len())
            .find(|&i| in_degree[i] > 0)
            .map(|i| stages[i].id.clone())
            .unwrap_or_default();
        return Err(PipelineError::Cycle { stage: stuck });
    }
    Ok(order)
}

// ── Pipeline ────────────────────────────────────────────────────────

/// A validated stage graph, created fresh per invocation and discarded
/// after the run. No state survives between runs.
pub struct Pipeline<T> {
    stages: Vec<Stage<T>>,
    order: Vec<usize>,
    stage_timeout: Duration,
}

/// Outcome of one pipeline run.
pub struct PipelineRun<T> {
    /// Output of every stage that reached `Done`, by stage id.
    pub outputs: HashMap<String, T>,
    /// Failure notes for every stage that did not.
    pub failures: Vec<StageFailure>,
    /// Final state per stage id.
    pub states: HashMap<String, StageState>,
}

impl<T> PipelineRun<T> {
    pub fn output(&self, stage: &str) -> Option<&T> {
        self.outputs.get(stage)
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl<T: Clone + Send + 'static> Pipeline<T> {
    pub fn builder() -> PipelineBuilder<T> {
        PipelineBuilder {
            stages: Vec::new(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Execute all stages in dependency order.
    ///
    /// `initial` is handed to stages with no dependencies. Sequential
    /// execution satisfies the only ordering contract (the dependency
    /// graph); each stage is one external LLM or API call, so extra
    /// parallelism buys nothing here.
    pub async fn run(self, initial: T) -> PipelineRun<T> {
        let mut outputs: HashMap<String, T> = HashMap::new();
        let mut failures: Vec<StageFailure> = Vec::new();
        let mut states: HashMap<String, StageState> = self
            .stages
            .iter()
            .map(|s| (s.id.clone(), StageState::Pending))
            .collect();

        for &i in &self.order {
            let stage = &self.stages[i];
            states.insert(stage.id.clone(), StageState::Ready);

            let mut inputs: Vec<(String, T)> = Vec::new();
            let mut upstream_failures = Vec::new();
            if stage.deps.is_empty() {
                inputs.push(("<initial>".to_string(), initial.clone()));
            } else {
                for dep in &stage.deps {
                    match outputs.get(dep) {
                        Some(out) => inputs.push((dep.clone(), out.clone())),
                        None => {
                            if let Some(f) = failures.iter().find(|f| &f.stage == dep) {
                                upstream_failures.push(f.clone());
                            }
                        }
                    }
                }
            }

            debug!(stage = %stage.id, inputs = inputs.len(), "running stage");
            states.insert(stage.id.clone(), StageState::Running);

            let ctx = StageContext {
                inputs,
                upstream_failures,
            };
            let result = tokio::time::timeout(self.stage_timeout, (stage.work)(ctx)).await;

            match result {
                Ok(Ok(output)) => {
                    states.insert(stage.id.clone(), StageState::Done);
                    outputs.insert(stage.id.clone(), output);
                }
                Ok(Err(reason)) => {
                    warn!(stage = %stage.id, %reason, "stage failed");
                    states.insert(stage.id.clone(), StageState::Failed);
                    failures.push(StageFailure {
                        stage: stage.id.clone(),
                        reason,
                    });
                }
                Err(_) => {
                    let reason = format!("timed out after {:?}", self.stage_timeout);
                    warn!(stage = %stage.id, %reason, "stage timed out");
                    states.insert(stage.id.clone(), StageState::Failed);
                    failures.push(StageFailure {
                        stage: stage.id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            done = outputs.len(),
            failed = failures.len(),
            "pipeline run complete"
        );
        PipelineRun {
            outputs,
            failures,
            states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn linear_pipeline_threads_outputs() {
        let pipeline = Pipeline::<String>::builder()
            .stage("a", &[], |ctx| async move {
                Ok(format!("{}+a", ctx.inputs().cloned().collect::<Vec<_>>().join(",")))
            })
            .stage("b", &["a"], |ctx| async move {
                Ok(format!("{}+b", ctx.inputs().cloned().collect::<Vec<_>>().join(",")))
            })
            .build()
            .unwrap();

        let run = pipeline.run("start".to_string()).await;
        assert_eq!(run.output("b").unwrap(), "start+a+b");
        assert!(!run.is_degraded());
    }

    #[tokio::test]
    async fn stage_receives_only_dependency_outputs() {
        // "other" runs but its output must not reach "sink".
        let pipeline = Pipeline::<String>::builder()
            .stage("src", &[], |_| async { Ok("from-src".to_string()) })
            .stage("other", &[], |_| async { Ok("from-other".to_string()) })
            .stage("sink", &["src"], |ctx| async move {
                Ok(ctx.inputs().cloned().collect::<Vec<_>>().join(","))
            })
            .build()
            .unwrap();

        let run = pipeline.run(String::new()).await;
        assert_eq!(run.output("sink").unwrap(), "from-src");
    }

    #[tokio::test]
    async fn diamond_dependency_order() {
        let pipeline = Pipeline::<String>::builder()
            .stage("final", &["left", "right"], |ctx| async move {
                Ok(ctx.inputs().cloned().collect::<Vec<_>>().join("|"))
            })
            .stage("left", &["root"], |_| async { Ok("L".to_string()) })
            .stage("right", &["root"], |_| async { Ok("R".to_string()) })
            .stage("root", &[], |_| async { Ok("root".to_string()) })
            .build()
            .unwrap();

        let run = pipeline.run(String::new()).await;
        // Inputs arrive in declaration order of the dependency list.
        assert_eq!(run.output("final").unwrap(), "L|R");
    }

    #[tokio::test]
    async fn failed_stage_degrades_but_terminal_still_runs() {
        let pipeline = Pipeline::<String>::builder()
            .stage("good", &[], |_| async { Ok("good-data".to_string()) })
            .stage("bad", &[], |_| async { Err("source exploded".to_string()) })
            .stage("assemble", &["good", "bad"], |ctx| async move {
                let mut doc = ctx.inputs().cloned().collect::<Vec<_>>().join(",");
                for f in &ctx.upstream_failures {
                    doc.push_str(&f.notice());
                }
                Ok(doc)
            })
            .build()
            .unwrap();

        let run = pipeline.run(String::new()).await;
        assert!(run.is_degraded());
        let doc = run.output("assemble").unwrap();
        assert!(doc.contains("good-data"));
        assert!(doc.contains("[stage bad unavailable: source exploded]"));
        assert_eq!(run.states["bad"], StageState::Failed);
        assert_eq!(run.states["assemble"], StageState::Done);
    }

    #[tokio::test]
    async fn timed_out_stage_is_a_failure_not_a_crash() {
        let pipeline = Pipeline::<String>::builder()
            .stage_timeout(Duration::from_millis(20))
            .stage("slow", &[], |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("never".to_string())
            })
            .stage("after", &["slow"], |ctx| async move {
                Ok(format!("notes={}", ctx.upstream_failures.len()))
            })
            .build()
            .unwrap();

        let run = pipeline.run(String::new()).await;
        assert_eq!(run.states["slow"], StageState::Failed);
        assert_eq!(run.output("after").unwrap(), "notes=1");
        assert!(run.failures[0].reason.contains("timed out"));
    }

    #[test]
    fn cycle_rejected_at_build() {
        let result = Pipeline::<String>::builder()
            .stage("a", &["b"], |_| async { Ok(String::new()) })
            .stage("b", &["a"], |_| async { Ok(String::new()) })
            .build();
        assert!(matches!(result, Err(PipelineError::Cycle { .. })));
    }

    #[test]
    fn self_dependency_rejected() {
        let result = Pipeline::<String>::builder()
            .stage("a", &["a"], |_| async { Ok(String::new()) })
            .build();
        assert!(matches!(result, Err(PipelineError::Cycle { .. })));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let result = Pipeline::<String>::builder()
            .stage("a", &["ghost"], |_| async { Ok(String::new()) })
            .build();
        assert!(matches!(
            result,
            Err(PipelineError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn duplicate_stage_rejected() {
        let result = Pipeline::<String>::builder()
            .stage("a", &[], |_| async { Ok(String::new()) })
            .stage("a", &[], |_| async { Ok(String::new()) })
            .build();
        assert!(matches!(result, Err(PipelineError::DuplicateStage { .. })));
    }

    #[tokio::test]
    async fn initial_input_reaches_only_root_stages() {
        let pipeline = Pipeline::<String>::builder()
            .stage("root", &[], |ctx| async move { Ok(ctx.inputs().cloned().collect::<Vec<_>>().join(",")) })
            .stage("child", &["root"], |ctx| async move {
                Ok(ctx.inputs().cloned().collect::<Vec<_>>().join(","))
            })
            .build()
            .unwrap();

        let run = pipeline.run("seed".to_string()).await;
        assert_eq!(run.output("root").unwrap(), "seed");
        // Child sees root's output, not the seed directly.
        assert_eq!(run.output("child").unwrap(), "seed");
    }
}
