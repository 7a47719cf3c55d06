//! End-to-end wizard flow tests against the demo adapters with zeroed
//! latencies and a pinned sampler.

use std::sync::Arc;

use telco_bpms_api::adapters::{CreditService, CrmService, IdentityService};
use telco_bpms_api::config::{Config, DemoLatencies};
use telco_bpms_api::mailer::EmailService;
use telco_bpms_api::models::*;
use telco_bpms_api::otp::{DemoOtpProvider, OtpProvider};
use telco_bpms_api::simulation::FixedSampler;
use telco_bpms_api::steps::{self, ClosureService};
use telco_bpms_api::wizard::{Applied, CaseWizard, Step, StepData, StepOutcome};

fn demo_config() -> Config {
    let mut config = Config::demo_defaults(3001);
    config.latencies = DemoLatencies::none();
    config
}

fn pinned_sampler() -> Arc<FixedSampler> {
    Arc::new(FixedSampler {
        matches: true,
        score: 92,
        suffix: 148,
        minutes: 12,
    })
}

fn identity_request(document_number: &str) -> IdentityValidationRequest {
    IdentityValidationRequest {
        document_type: "CC".to_string(),
        document_number: document_number.to_string(),
        document_photo: Some("aW1n".to_string()),
        face_photo: Some("aW1n".to_string()),
    }
}

fn enrollment_form() -> EnrollmentForm {
    EnrollmentForm {
        first_name: "María".to_string(),
        last_name: "García López".to_string(),
        birth_date: "1982-05-17".to_string(),
        gender: "F".to_string(),
        email: "maria.garcia@example.com".to_string(),
        phone: "3001234567".to_string(),
        address: "Calle 45 # 12-34".to_string(),
        city: "Bogotá D.C.".to_string(),
        department: "Cundinamarca".to_string(),
    }
}

fn document_bundle() -> DocumentBundle {
    let cedula = steps::ingest_document(
        DocumentKind::Cedula,
        "cedula.pdf",
        "application/pdf",
        b"cedula-bytes",
    )
    .unwrap();
    let comprobante = steps::ingest_document(
        DocumentKind::Comprobante,
        "recibo.pdf",
        "application/pdf",
        b"recibo-bytes",
    )
    .unwrap();
    DocumentBundle {
        documents: vec![cedula, comprobante],
        consent_given: true,
    }
}

/// Runs the whole eight-step flow for a document whose simulated credit
/// score is approved (seed 123456 -> 656, fair, approved).
#[tokio::test]
async fn full_flow_reaches_closure() {
    let config = demo_config();
    let sampler = pinned_sampler();

    let identity_service = IdentityService::with_sampler(&config, sampler.clone());
    let credit_service = CreditService::new(&config);
    let otp_provider = DemoOtpProvider::new(config.latencies.otp_send);
    let closure_service = ClosureService::new(
        EmailService::new(&config),
        CrmService::new(&config),
        sampler.clone(),
    );

    let mut wizard = CaseWizard::new();
    assert_eq!(wizard.current_step(), Step::IdentityValidation);
    assert_eq!(wizard.progress_percent(), 0);

    // Step 1: identity
    let request = identity_request("1234567890");
    let response = identity_service.validate(&request).await;
    assert!(response.valid);
    let data = steps::identity_step_data(&request, &response).unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::Enrollment)
    );
    assert_eq!(
        wizard.record().identity.as_ref().unwrap().first_name,
        "María"
    );

    // Step 2: enrollment
    let data = steps::enrollment_step_data(enrollment_form()).unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::DocumentUpload)
    );

    // Step 3: documents
    let data = steps::documents_step_data(document_bundle()).unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::CreditValidation)
    );

    // Step 4: credit (seed 123456 -> approved)
    let credit = credit_service
        .validate(&CreditValidationRequest {
            document_type: "CC".to_string(),
            document_number: "1234567890".to_string(),
            first_name: "María".to_string(),
            last_name: "García López".to_string(),
            birth_date: None,
        })
        .await;
    assert_eq!(credit.data.decision, CreditDecision::Approved);
    assert_eq!(
        wizard.advance(StepData::Credit(credit)).unwrap(),
        StepOutcome::Advanced(Step::ServiceSelection)
    );

    // Step 5: service
    let data = steps::select_service("combo-triple-plus").unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::ContractGeneration)
    );
    assert_eq!(wizard.record().service.as_ref().unwrap().service_price, 220000);

    // Step 6: contract
    let data = steps::generate_contract(wizard.record(), sampler.as_ref(), &config)
        .await
        .unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::DigitalSignature)
    );
    let contract = wizard.record().contract.as_ref().unwrap();
    assert_eq!(contract.contract_number, "CONT-2025-0148");
    assert!(contract.hash.starts_with("sha256:"));

    // Step 7: signature
    let challenge = otp_provider.request_otp("3001234567").await;
    let code = challenge.demo_code.unwrap();
    let data = steps::sign_contract(&otp_provider, &config, "3001234567", &code)
        .await
        .unwrap();
    assert_eq!(
        wizard.advance(data).unwrap(),
        StepOutcome::Advanced(Step::CaseComplete)
    );

    // Step 8: closure
    let data = closure_service.close_case(wizard.record()).await.unwrap();
    assert_eq!(wizard.advance(data).unwrap(), StepOutcome::Terminal);

    let closure = wizard.record().closure.as_ref().unwrap();
    assert_eq!(closure.case_number, "CASO-0148");
    assert_eq!(closure.completion_minutes, 12);
    assert!(closure.email_sent);
    assert!(closure.crm_synced);
    assert_eq!(wizard.progress_percent(), 100);
}

/// A simulated biometric mismatch produces an in-band invalid envelope with
/// a low score band, and never step data.
#[tokio::test]
async fn biometric_mismatch_yields_invalid_envelope() {
    let config = demo_config();
    let sampler = Arc::new(FixedSampler {
        matches: false,
        score: 55,
        suffix: 0,
        minutes: 10,
    });
    let identity_service = IdentityService::with_sampler(&config, sampler);

    let request = identity_request("1234567890");
    let response = identity_service.validate(&request).await;
    assert!(response.success);
    assert!(!response.valid);
    assert!(response.data.is_none());
    assert!(response.message.contains("biométrica"));

    assert!(steps::identity_step_data(&request, &response).is_none());
}

/// A score between 580 and 649 merges but halts the flow for escalation.
#[tokio::test]
async fn manual_review_credit_halts_the_flow() {
    let config = demo_config();
    let credit_service = CreditService::new(&config);

    let mut wizard = CaseWizard::new();
    // Seed 100000 -> score 600 -> manual review.
    let identity_service = IdentityService::with_sampler(&config, pinned_sampler());
    let request = identity_request("100000");
    let response = identity_service.validate(&request).await;
    let data = steps::identity_step_data(&request, &response).unwrap();
    wizard.advance(data).unwrap();
    wizard
        .advance(steps::enrollment_step_data(enrollment_form()).unwrap())
        .unwrap();
    wizard
        .advance(steps::documents_step_data(document_bundle()).unwrap())
        .unwrap();

    let credit = credit_service
        .validate(&CreditValidationRequest {
            document_type: "CC".to_string(),
            document_number: "100000".to_string(),
            first_name: "Juan".to_string(),
            last_name: "Pérez".to_string(),
            birth_date: None,
        })
        .await;
    assert_eq!(credit.data.score, 600);
    assert_eq!(credit.data.decision, CreditDecision::ManualReview);

    let outcome = wizard.advance(StepData::Credit(credit)).unwrap();
    assert_eq!(outcome, StepOutcome::Halted(CreditDecision::ManualReview));
    // Still on the credit step, report preserved for the escalation screen.
    assert_eq!(wizard.current_step(), Step::CreditValidation);
    assert!(wizard.record().credit.is_some());
    assert!(!wizard.can_advance());
}

#[test]
fn retreat_keeps_sections_and_reset_clears_them() {
    let mut wizard = CaseWizard::new();
    let identity = telco_bpms_api::simulation::mock_person("1234567890", 92);
    wizard
        .advance(StepData::Identity {
            document_type: "CC".to_string(),
            document_number: "1234567890".to_string(),
            document_photo: None,
            face_photo: None,
            identity,
        })
        .unwrap();
    assert_eq!(wizard.current_step(), Step::Enrollment);

    wizard.retreat();
    assert_eq!(wizard.current_step(), Step::IdentityValidation);
    // No rollback: the merged section survives the retreat.
    assert!(wizard.record().identity.is_some());

    // Floor at the first step.
    wizard.retreat();
    assert_eq!(wizard.current_step(), Step::IdentityValidation);

    wizard.reset();
    assert_eq!(wizard.current_step(), Step::IdentityValidation);
    assert!(wizard.record().identity.is_none());
}

#[test]
fn stale_token_responses_are_dropped() {
    let mut wizard = CaseWizard::new();
    let token = wizard.step_token();

    // The user resets while the identity call is in flight.
    wizard.reset();

    let identity = telco_bpms_api::simulation::mock_person("1234567890", 92);
    let applied = wizard.apply(
        token,
        StepData::Identity {
            document_type: "CC".to_string(),
            document_number: "1234567890".to_string(),
            document_photo: None,
            face_photo: None,
            identity,
        },
    );
    assert_eq!(applied, Applied::Stale);
    assert!(wizard.record().identity.is_none());
    assert_eq!(wizard.current_step(), Step::IdentityValidation);
}

#[test]
fn fresh_token_applies_normally() {
    let mut wizard = CaseWizard::new();
    let token = wizard.step_token();

    let identity = telco_bpms_api::simulation::mock_person("1234567890", 92);
    let applied = wizard.apply(
        token,
        StepData::Identity {
            document_type: "CC".to_string(),
            document_number: "1234567890".to_string(),
            document_photo: None,
            face_photo: None,
            identity,
        },
    );
    assert_eq!(
        applied,
        Applied::Merged(StepOutcome::Advanced(Step::Enrollment))
    );
}
