//! Multi-step dialog runs against an in-memory page

mod common;

use common::{FakeStep, FakeSurface, FakeWidget, Mutation, engine};
use formpilot_decision::{DecisionEngine, FormScope};
use formpilot_modal_flow::{
    DocumentPaths, FlowStatus, ModalNavigator, NavigatorConfig, NavigatorState, WidgetKind,
};
use formpilot_resilience::{ResilienceConfig, ResilientExecutor, RetryPolicy};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn rules() -> Vec<Value> {
    vec![
        json!({
            "id": "work_auth_us",
            "signature": {"field_type": "radio", "q_pattern": "authorized to work"},
            "strategy": {
                "kind": "one_of_options_from_profile",
                "params": {
                    "key": "work_authorization.US",
                    "synonyms": {"Yes": ["yes", "authorized"], "No": ["no"]}
                }
            }
        }),
        json!({
            "id": "phone",
            "signature": {"field_type": "text", "q_pattern": "phone"},
            "strategy": {"kind": "profile_key", "params": {"key": "contact.phone"}}
        }),
        json!({
            "id": "city",
            "signature": {"field_type": "text", "q_pattern": "location|city"},
            "strategy": {"kind": "profile_key", "params": {"key": "contact.city"}}
        }),
        json!({
            "id": "years",
            "signature": {
                "field_type": "number",
                "q_pattern": "years of (?P<skill>\\w+) experience"
            },
            "strategy": {
                "kind": "numeric_from_profile",
                "params": {"key": "years_experience.{skill}"}
            }
        }),
        json!({
            "id": "terms",
            "signature": {"field_type": "checkbox", "q_pattern": "agree"},
            "strategy": {"kind": "literal", "params": {"value": true}}
        }),
        json!({
            "id": "newsletter",
            "signature": {"field_type": "checkbox", "q_pattern": "newsletter"},
            "strategy": {"kind": "literal", "params": {"value": false}}
        }),
        json!({
            "id": "english",
            "signature": {"field_type": "select", "q_pattern": "english"},
            "strategy": {"kind": "literal", "params": {"value": "Fluent"}}
        }),
    ]
}

fn profile() -> Value {
    json!({
        "work_authorization": {"US": "yes"},
        "contact": {"phone": "+972501234567", "city": "Tel Aviv"},
        "years_experience": {"python": 6},
        "salary_expectation": {"monthly_net_nis": 31000}
    })
}

fn decision_engine() -> Arc<DecisionEngine> {
    engine(rules(), profile())
}

fn executor() -> ResilientExecutor {
    ResilientExecutor::new(ResilienceConfig {
        retry: RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        },
        ..ResilienceConfig::default()
    })
}

fn navigator(surface: Arc<FakeSurface>) -> ModalNavigator {
    ModalNavigator::new(
        surface,
        decision_engine(),
        executor(),
        FormScope::new("jobs.example.com", "job_apply"),
    )
}

fn click(id: &str) -> Mutation {
    Mutation::Click(id.to_string())
}

const AUTH_QUESTION: &str = "Are you legally authorized to work in the US?";

fn three_step_application() -> Vec<FakeStep> {
    vec![
        FakeStep::new(
            "Contact info 33%",
            vec![
                FakeWidget::radio("auth_yes", "auth", AUTH_QUESTION, "Yes"),
                FakeWidget::radio("auth_no", "auth", AUTH_QUESTION, "No"),
                FakeWidget::new("phone", WidgetKind::Textbox, "Mobile phone number"),
                FakeWidget::button("next", "Next"),
            ],
        ),
        FakeStep::new(
            "Experience 66%",
            vec![
                FakeWidget::new(
                    "years",
                    WidgetKind::NumberInput,
                    "How many years of Python experience do you have?",
                ),
                FakeWidget::new("terms", WidgetKind::Checkbox, "I agree to the terms"),
                FakeWidget::new("news", WidgetKind::Checkbox, "Subscribe to our newsletter"),
                FakeWidget::new("english", WidgetKind::Select, "English proficiency")
                    .options(&["Select an option", "Native", "Fluent"]),
                FakeWidget::button("review", "Review"),
            ],
        ),
        FakeStep::new(
            "Review your application 100%",
            vec![FakeWidget::button("submit", "Submit application")],
        ),
    ]
}

#[tokio::test]
async fn fills_each_step_in_order_and_submits() {
    let surface = Arc::new(FakeSurface::new(three_step_application()));
    let mut nav = navigator(surface.clone());

    let outcome = nav.run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: true });
    assert!(outcome.submitted);
    assert_eq!(outcome.steps_processed, 3);
    assert!(outcome.validation_errors.is_empty());
    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Check("auth_yes".to_string()),
            Mutation::Fill("phone".to_string(), "+972501234567".to_string()),
            click("next"),
            // checkboxes, then selects, then numbers
            Mutation::Check("terms".to_string()),
            Mutation::Select("english".to_string(), "Fluent".to_string()),
            Mutation::Fill("years".to_string(), "6".to_string()),
            click("review"),
            click("submit"),
        ]
    );
    assert_eq!(
        nav.state(),
        &NavigatorState::Terminal(FlowStatus::Completed { submitted: true })
    );
    assert!(surface.is_closed());
}

#[tokio::test]
async fn dry_run_stops_before_submit() {
    let surface = Arc::new(FakeSurface::new(three_step_application()));
    let mut nav = navigator(surface.clone()).with_config(NavigatorConfig {
        should_submit: false,
        ..NavigatorConfig::default()
    });

    let outcome = nav.run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: false });
    assert_eq!(outcome.steps_processed, 3);
    assert!(!surface.mutations().contains(&click("submit")));
    assert!(!surface.is_closed());
}

#[tokio::test]
async fn no_dialog_is_completed_without_steps() {
    let surface = Arc::new(FakeSurface::new(Vec::new()));
    let outcome = navigator(surface.clone()).run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: false });
    assert_eq!(outcome.steps_processed, 0);
    assert!(surface.mutations().is_empty());
}

#[tokio::test]
async fn missing_navigation_button_fails() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Contact 50%",
        vec![FakeWidget::new("phone", WidgetKind::Textbox, "Phone")],
    )]));
    let outcome = navigator(surface).run().await;

    assert_eq!(
        outcome.status,
        FlowStatus::Failed {
            error: "Navigation button not found".to_string()
        }
    );
    assert_eq!(outcome.steps_processed, 1);
    assert_eq!(outcome.validation_errors, vec!["Navigation button not found".to_string()]);
}

#[tokio::test]
async fn unchanged_dialog_is_refilled_without_mutations() {
    let surface = Arc::new(FakeSurface::new(vec![
        FakeStep::new(
            "Contact 50%",
            vec![
                FakeWidget::new("terms", WidgetKind::Checkbox, "I agree to the terms"),
                FakeWidget::new("phone", WidgetKind::Textbox, "Mobile phone number"),
                FakeWidget::radio("auth_yes", "auth", "Are you authorized to work here?", "Yes"),
                FakeWidget::radio("auth_no", "auth", "Are you authorized to work here?", "No"),
                FakeWidget::button("next", "Continue"),
            ],
        )
        .stuck_for(1),
        FakeStep::new("Review 100%", vec![FakeWidget::button("submit", "Submit")]),
    ]));

    let outcome = navigator(surface.clone()).run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: true });
    assert_eq!(outcome.steps_processed, 3);
    // The second pass over "Contact 50%" only clicks Continue again.
    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Check("auth_yes".to_string()),
            Mutation::Check("terms".to_string()),
            Mutation::Fill("phone".to_string(), "+972501234567".to_string()),
            click("next"),
            click("next"),
            click("submit"),
        ]
    );
    assert_eq!(surface.value_of(0, "terms"), (true, String::new()));
}

#[tokio::test]
async fn persistent_validation_error_blocks_the_run() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Contact 50%",
        vec![
            FakeWidget::new("phone", WidgetKind::Textbox, "Mobile phone number"),
            FakeWidget::new(
                "err",
                WidgetKind::ErrorMessage,
                "Please enter a valid answer. This field is required",
            ),
            FakeWidget::button("next", "Next"),
        ],
    )
    .stuck_for(u32::MAX)]));

    let outcome = navigator(surface.clone()).run().await;

    assert_eq!(
        outcome.status,
        FlowStatus::ValidationBlocked {
            errors: vec!["Please enter a valid answer. This field is required".to_string()]
        }
    );
    assert_eq!(outcome.steps_processed, 2);
    assert_eq!(outcome.validation_errors.len(), 1);
    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Fill("phone".to_string(), "+972501234567".to_string()),
            click("next"),
        ]
    );
}

#[tokio::test]
async fn stuck_dialog_without_errors_hits_max_steps() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Questions 40%",
        vec![FakeWidget::button("next", "Next")],
    )
    .stuck_for(u32::MAX)]));
    let mut nav = navigator(surface.clone()).with_config(NavigatorConfig {
        max_steps: 3,
        ..NavigatorConfig::default()
    });

    let outcome = nav.run().await;

    assert_eq!(outcome.status, FlowStatus::MaxStepsReached);
    assert_eq!(outcome.steps_processed, 3);
    assert_eq!(outcome.validation_errors, vec!["Max steps reached".to_string()]);
    assert_eq!(surface.mutations(), vec![click("next"); 3]);
}

#[tokio::test]
async fn preselected_and_unwanted_fields_are_left_alone() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Questions 20%",
        vec![
            FakeWidget::radio("relocate", "relocate", "Willing to relocate?", "Yes").checked(),
            FakeWidget::radio("keep_a", "resume_choice", "Resume", "Deselect resume.pdf").checked(),
            FakeWidget::radio("keep_b", "resume_choice", "Resume", "Upload another"),
            FakeWidget::new("terms", WidgetKind::Checkbox, "I agree to the terms").checked(),
            FakeWidget::new("news", WidgetKind::Checkbox, "Send me the newsletter"),
            FakeWidget::button("next", "Next"),
        ],
    )]));

    let outcome = navigator(surface.clone()).run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: false });
    assert_eq!(outcome.steps_processed, 1);
    assert_eq!(surface.mutations(), vec![click("next")]);
    assert!(surface.value_of(0, "terms").0);
    assert!(!surface.value_of(0, "news").0);
}

#[tokio::test]
async fn typeahead_combobox_types_then_picks_best_match() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Location 50%",
        vec![
            FakeWidget::new("city", WidgetKind::Combobox, "Location (city)")
                .options(&["Tel Aviv District, Israel", "Tel Aviv-Yafo, Israel"])
                .typeahead(),
            FakeWidget::button("next", "Next"),
        ],
    )]));

    navigator(surface.clone()).run().await;

    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Fill("city".to_string(), "Tel Aviv".to_string()),
            Mutation::Select("city".to_string(), "Tel Aviv District, Israel".to_string()),
            click("next"),
        ]
    );
}

#[tokio::test]
async fn numeric_textboxes_get_integer_values() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Compensation 80%",
        vec![
            FakeWidget::new("salary", WidgetKind::Textbox, "Expected monthly salary (NIS)")
                .input_mode("numeric"),
            FakeWidget::new("refs", WidgetKind::Textbox, "How many references can you provide?")
                .input_mode("decimal"),
            FakeWidget::new("note", WidgetKind::Textbox, "Anything else we should know?"),
            FakeWidget::button("next", "Next"),
        ],
    )]));

    navigator(surface.clone()).run().await;

    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Fill("salary".to_string(), "31000".to_string()),
            Mutation::Fill("refs".to_string(), "0".to_string()),
            Mutation::Fill("note".to_string(), "N/A".to_string()),
            click("next"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn intercepted_click_is_retried() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Questions 50%",
        vec![FakeWidget::button("next", "Next")],
    )]));
    surface.fail_clicks(2);

    let outcome = navigator(surface.clone()).run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: false });
    assert_eq!(surface.mutations(), vec![click("next")]);
    assert_eq!(surface.current_step(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_submit_is_not_retried() {
    let surface = Arc::new(FakeSurface::new(vec![FakeStep::new(
        "Review 100%",
        vec![FakeWidget::button("submit", "Submit application")],
    )]));
    surface.fail_clicks(1);

    let outcome = navigator(surface.clone()).run().await;

    let FlowStatus::Failed { error } = &outcome.status else {
        panic!("expected failure, got {:?}", outcome.status);
    };
    assert!(error.contains("submit_application"), "{error}");
    assert!(!outcome.submitted);
    assert!(surface.mutations().is_empty());
    assert!(!surface.is_closed());
}

#[tokio::test(start_paused = true)]
async fn open_circuit_fails_the_run_without_touching_the_page() {
    let surface = Arc::new(FakeSurface::new(three_step_application()));
    let executor = executor();
    for _ in 0..5 {
        executor.breaker().record_failure();
    }
    let mut nav = ModalNavigator::new(
        surface.clone(),
        decision_engine(),
        executor,
        FormScope::default(),
    );

    let outcome = nav.run().await;

    assert!(matches!(outcome.status, FlowStatus::Failed { .. }));
    assert_eq!(outcome.steps_processed, 0);
    assert!(surface.mutations().is_empty());
}

#[tokio::test]
async fn documents_are_attached_once() {
    let resume = tempfile::NamedTempFile::new().expect("resume file");
    let surface = Arc::new(FakeSurface::new(vec![
        FakeStep::new(
            "Resume 40%",
            vec![
                FakeWidget::new("resume", WidgetKind::FileInput, "Upload resume"),
                FakeWidget::new("cover", WidgetKind::FileInput, "Upload cover letter"),
                FakeWidget::button("next", "Next"),
            ],
        )
        .stuck_for(1),
        FakeStep::new("Review 100%", vec![FakeWidget::button("submit", "Submit")]),
    ]));
    let mut nav = navigator(surface.clone()).with_config(NavigatorConfig {
        documents: DocumentPaths {
            resume_path: Some(resume.path().to_path_buf()),
            cover_letter_path: None,
        },
        ..NavigatorConfig::default()
    });

    let outcome = nav.run().await;

    assert_eq!(outcome.status, FlowStatus::Completed { submitted: true });
    assert_eq!(
        surface.mutations(),
        vec![
            Mutation::Attach("resume".to_string(), resume.path().to_path_buf()),
            click("next"),
            click("next"),
            click("submit"),
        ]
    );
}
