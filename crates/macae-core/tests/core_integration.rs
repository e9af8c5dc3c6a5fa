#![allow(clippy::unwrap_used, clippy::expect_used)]

use macae_core::*;

// ---------------------------------------------------------------------------
// 1. Stored documents keep their discriminator through JSON
// ---------------------------------------------------------------------------

#[test]
fn stored_items_roundtrip_with_discriminator() {
    let plan = Plan::new("session-1", "user-1", "Onboard a new hire", AgentType::Planner);
    let step = Step::new(&plan, 1, AgentType::Hr, "Create an onboarding checklist");
    let message = AgentMessage::new("session-1", "user-1", AgentType::Hr, "checklist ready")
        .for_plan(&plan.id)
        .for_step(&step.id);

    for item in [
        StoredItem::from(Session::new("session-1", "user-1")),
        StoredItem::from(plan.clone()),
        StoredItem::from(step.clone()),
        StoredItem::from(message.clone()),
        StoredItem::from(ChatMessage::user("session-1", "hello")),
    ] {
        let json = serde_json::to_value(&item).unwrap();
        let expected = item.data_type().unwrap().as_str();
        assert_eq!(json["data_type"], expected);
        let back: StoredItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    let stored_step = StoredItem::from(step.clone());
    assert_eq!(stored_step.plan_id(), Some(plan.id.as_str()));
    assert_eq!(stored_step.session_id(), Some("session-1"));
    assert_eq!(
        StoredItem::from(message).plan_id(),
        Some(plan.id.as_str())
    );
    assert!(Plan::from_stored(stored_step).is_none());
}

// ---------------------------------------------------------------------------
// 2. Plan aggregate follows the steps through a full approval cycle
// ---------------------------------------------------------------------------

#[test]
fn plan_aggregate_tracks_step_lifecycle() {
    let mut plan = Plan::new("s", "u", "Plan a product launch", AgentType::Planner);
    let mut steps = vec![
        Step::new(&plan, 1, AgentType::Marketing, "Draft the press release"),
        Step::new(&plan, 2, AgentType::Product, "Finalize feature list"),
        Step::new(&plan, 3, AgentType::Procurement, "Order launch swag"),
    ];
    plan.refresh_from_steps(&steps).unwrap();
    assert_eq!(plan.overall_status, PlanStatus::Planned);

    for step in &mut steps {
        step.apply_decision(true, None, None).unwrap();
        assert!(plan.completed <= plan.total_steps);
    }
    plan.refresh_from_steps(&steps).unwrap();
    assert_eq!(plan.overall_status, PlanStatus::InProgress);

    for step in &mut steps {
        step.complete("done").unwrap();
    }
    plan.refresh_from_steps(&steps).unwrap();
    assert_eq!(plan.overall_status, PlanStatus::Completed);
    assert_eq!(plan.completed, 3);
    assert_eq!(plan.total_steps, 3);

    let pws = PlanWithSteps::new(plan, steps);
    assert_eq!(pws.counts.completed, pws.plan.completed);
}

// ---------------------------------------------------------------------------
// 3. Error codes
// ---------------------------------------------------------------------------

#[test]
fn error_codes_cover_taxonomy() {
    let cases = [
        (MacaeError::Validation("x".into()), ErrorCode::ValidationError),
        (MacaeError::not_found("step", "1"), ErrorCode::NotFound),
        (MacaeError::UnknownAgentType("x".into()), ErrorCode::ValidationError),
        (MacaeError::Agent("x".into()), ErrorCode::AgentError),
        (MacaeError::Orchestrator("x".into()), ErrorCode::TaskError),
        (MacaeError::Config("x".into()), ErrorCode::ConfigurationError),
        (MacaeError::Client("x".into()), ErrorCode::ExternalServiceError),
    ];
    for (err, code) in cases {
        assert_eq!(err.error_code(), code, "{err}");
    }

    let io: MacaeError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert_eq!(io.error_code(), ErrorCode::DatabaseError);
}

// ---------------------------------------------------------------------------
// 4. Task outcome wire shape
// ---------------------------------------------------------------------------

#[test]
fn task_outcome_is_tagged_by_status() {
    let outcome = TaskOutcome::NotCreated {
        reason: "content rejected".into(),
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "not_created");

    let skipped = TaskOutcome::Skipped {
        agent: AgentType::Hr,
    };
    let json = serde_json::to_value(&skipped).unwrap();
    assert_eq!(json["agent"], "Hr_Agent");
}
