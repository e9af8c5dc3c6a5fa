//! Step transitions and the derived plan aggregate.
//!
//! Steps move through a small state machine; a plan never stores an
//! independent status, it is recomputed from its steps after every change.

use crate::models::{HumanApprovalStatus, Plan, PlanStatus, Step, StepStatus};
use crate::{MacaeError, MacaeResult};
use chrono::Utc;

impl StepStatus {
    /// `completed`, `rejected` and `failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Rejected | StepStatus::Failed
        )
    }

    /// Whether a step may move from `self` to `next`.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Planned, AwaitingFeedback | Approved | Rejected)
                | (AwaitingFeedback, Planned | Approved | Rejected)
                | (Approved, Completed | Failed | Rejected)
        )
    }
}

impl Step {
    /// Move to `next`, or fail with `InvalidTransition`.
    pub fn transition(&mut self, next: StepStatus) -> MacaeResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MacaeError::InvalidTransition(format!(
                "step {} cannot go from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a human approval decision on this step.
    ///
    /// Feedback text and a rewritten action are kept even on rejection so the
    /// decision history stays readable.
    pub fn apply_decision(
        &mut self,
        approved: bool,
        feedback: Option<&str>,
        updated_action: Option<&str>,
    ) -> MacaeResult<()> {
        let next = if approved {
            StepStatus::Approved
        } else {
            StepStatus::Rejected
        };
        self.transition(next)?;
        self.human_approval_status = if approved {
            HumanApprovalStatus::Accepted
        } else {
            HumanApprovalStatus::Rejected
        };
        self.record_feedback(feedback, updated_action);
        Ok(())
    }

    /// Store free-text feedback without changing status.
    pub fn record_feedback(&mut self, feedback: Option<&str>, updated_action: Option<&str>) {
        if let Some(text) = feedback.filter(|t| !t.trim().is_empty()) {
            self.human_feedback = Some(text.to_string());
        }
        if let Some(action) = updated_action.filter(|a| !a.trim().is_empty()) {
            self.updated_action = Some(action.to_string());
        }
        self.updated_at = Utc::now();
    }

    /// Finish an approved step with the owning agent's reply.
    pub fn complete(&mut self, reply: impl Into<String>) -> MacaeResult<()> {
        self.transition(StepStatus::Completed)?;
        self.agent_reply = Some(reply.into());
        Ok(())
    }

    /// Finish an approved step as failed, keeping the reason as its reply.
    pub fn fail(&mut self, reason: impl Into<String>) -> MacaeResult<()> {
        self.transition(StepStatus::Failed)?;
        self.agent_reply = Some(reason.into());
        Ok(())
    }
}

impl Plan {
    /// Aggregate status for a set of steps.
    pub fn derive_status(steps: &[Step]) -> PlanStatus {
        if steps.iter().any(|s| s.status == StepStatus::Failed) {
            PlanStatus::Failed
        } else if !steps.is_empty() && steps.iter().all(|s| s.status.is_terminal()) {
            PlanStatus::Completed
        } else if steps
            .iter()
            .any(|s| !matches!(s.status, StepStatus::Planned | StepStatus::AwaitingFeedback))
        {
            PlanStatus::InProgress
        } else {
            PlanStatus::Planned
        }
    }

    /// Recompute `total_steps`, `completed` and `overall_status` from the
    /// full step list of this plan.
    pub fn refresh_from_steps(&mut self, steps: &[Step]) -> MacaeResult<()> {
        if let Some(foreign) = steps.iter().find(|s| s.plan_id != self.id) {
            return Err(MacaeError::Validation(format!(
                "step {} belongs to plan {}, not {}",
                foreign.id, foreign.plan_id, self.id
            )));
        }
        self.total_steps = steps.len();
        self.completed = steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        self.overall_status = Self::derive_status(steps);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// A clarification was requested and not yet answered.
    pub fn is_awaiting_clarification(&self) -> bool {
        self.human_clarification_request.is_some() && self.human_clarification_response.is_none()
    }

    /// Record the human's clarification and release every step that was
    /// waiting on it. Returns how many steps were released.
    pub fn apply_clarification(&mut self, text: &str, steps: &mut [Step]) -> MacaeResult<usize> {
        if text.trim().is_empty() {
            return Err(MacaeError::Validation(
                "human_clarification must not be empty".into(),
            ));
        }
        self.human_clarification_response = Some(text.to_string());
        self.updated_at = Utc::now();

        let mut released = 0;
        for step in steps
            .iter_mut()
            .filter(|s| s.plan_id == self.id && s.status == StepStatus::AwaitingFeedback)
        {
            step.transition(StepStatus::Planned)?;
            released += 1;
        }
        Ok(released)
    }
}
