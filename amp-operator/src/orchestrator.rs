//! Ordered, fail-fast execution of reconcile steps for one component.
//!
//! A component reconcile is declared as a list of [`Step`]s. Each step has a
//! name, an action that reconciles one object, and an optional inclusion
//! predicate. Steps run strictly in order. A predicate is evaluated only when
//! its step is reached; a step it excludes is never invoked. The first failing
//! step stops the run and nothing after it is attempted. Steps already applied
//! are not rolled back.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error, info};

use crate::error::{ReconcileError, Result};
use crate::reconciler::Outcome;

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome>> + Send + 'a>>;

/// One named reconcile action.
pub struct Step<'a> {
    name: &'static str,
    action: Box<dyn FnOnce() -> StepFuture<'a> + Send + 'a>,
    predicate: Option<Box<dyn FnOnce() -> bool + Send + 'a>>,
}

impl<'a> Step<'a> {
    /// Step that always runs. `action` is not called until the step is reached.
    pub fn new<F, Fut>(name: &'static str, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<Outcome>> + Send + 'a,
    {
        Self {
            name,
            action: Box::new(move || Box::pin(action()) as StepFuture<'a>),
            predicate: None,
        }
    }

    /// Only run the step if `predicate` holds when the step is reached.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: FnOnce() -> bool + Send + 'a,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("conditional", &self.predicate.is_some())
            .finish()
    }
}

/// How a step ended in a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Applied(Outcome),
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Applied(outcome) => outcome.fmt(f),
            StepStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Per-step results of a successful run, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    component: &'static str,
    steps: Vec<(&'static str, StepStatus)>,
}

impl ReconcileReport {
    fn new(component: &'static str) -> Self {
        Self {
            component,
            steps: Vec::new(),
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn steps(&self) -> &[(&'static str, StepStatus)] {
        &self.steps
    }

    /// Status of the named step.
    pub fn status(&self, step: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|(name, _)| *name == step)
            .map(|(_, status)| *status)
    }

    /// Whether any step created or updated an object.
    pub fn changed(&self) -> bool {
        self.steps
            .iter()
            .any(|(_, status)| matches!(status, StepStatus::Applied(o) if o.is_change()))
    }

    /// Names of steps that created or updated an object.
    pub fn changed_steps(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|(_, status)| matches!(status, StepStatus::Applied(o) if o.is_change()))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Runs the steps of one component.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    component: &'static str,
    steps: Vec<Step<'a>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step<'a>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step<'a>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Declared step names, in order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::name).collect()
    }

    pub async fn run(self) -> Result<ReconcileReport> {
        let component = self.component;
        let mut report = ReconcileReport::new(component);

        for Step {
            name,
            action,
            predicate,
        } in self.steps
        {
            if let Some(predicate) = predicate {
                if !predicate() {
                    debug!(component, step = name, "Step skipped");
                    report.steps.push((name, StepStatus::Skipped));
                    continue;
                }
            }

            match action().await {
                Ok(outcome) => {
                    debug!(component, step = name, %outcome, "Step done");
                    report.steps.push((name, StepStatus::Applied(outcome)));
                }
                Err(e) => {
                    error!(
                        component,
                        step = name,
                        outcome = %Outcome::Failed,
                        error = %e,
                        "Reconcile step failed"
                    );
                    return Err(ReconcileError::Step {
                        step: name.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            component,
            changed = ?report.changed_steps(),
            "Reconciled {}", component
        );
        Ok(report)
    }
}
