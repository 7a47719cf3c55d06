/// Integration tests with mocked external APIs
/// Tests the production adapters and the mail path without hitting real services
use std::sync::Arc;

use chrono::Utc;
use telco_bpms_api::adapters::{CreditService, CrmService, IdentityService};
use telco_bpms_api::config::{
    ApiMode, BureauConfig, Config, CrmConfig, DemoLatencies, EmailConfig, IdentityProviderConfig,
};
use telco_bpms_api::mailer::{ContractAttachments, ContractEmailData, EmailService};
use telco_bpms_api::models::{
    CaseRecord, Contract, CreditDecision, CreditRating, CreditValidationRequest, EnrollmentForm,
    IdentityValidationRequest, SelectedService, Signature,
};
use telco_bpms_api::relay::{MailTransport, ProviderTransport};
use telco_bpms_api::simulation::{mock_person, FixedSampler};
use telco_bpms_api::steps::{self, ClosureService};
use telco_bpms_api::wizard::StepData;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Production-mode config with every provider pointed at the mock server.
fn production_config(base_url: &str) -> Config {
    Config {
        port: 3001,
        mode: ApiMode::Production,
        identity: IdentityProviderConfig {
            base_url: base_url.to_string(),
            api_key: "test_identity_key".to_string(),
            client_id: "test_client".to_string(),
        },
        data_credito: BureauConfig {
            base_url: base_url.to_string(),
            api_key: "test_dc_key".to_string(),
            username: Some("dc_user".to_string()),
            password: Some("dc_pass".to_string()),
        },
        trans_union: BureauConfig {
            base_url: base_url.to_string(),
            api_key: "test_tu_key".to_string(),
            username: None,
            password: None,
        },
        crm: CrmConfig {
            base_url: base_url.to_string(),
            api_key: "test_crm_key".to_string(),
        },
        email: EmailConfig {
            relay_url: base_url.to_string(),
            provider_url: format!("{}/provider/send", base_url),
            user: "relay_user".to_string(),
            password: "relay_pass".to_string(),
            from: "Telco <noreply@konrad.edu.co>".to_string(),
        },
        latencies: DemoLatencies::none(),
    }
}

fn identity_request() -> IdentityValidationRequest {
    IdentityValidationRequest {
        document_type: "CC".to_string(),
        document_number: "1234567890".to_string(),
        document_photo: Some("aW1n".to_string()),
        face_photo: Some("aW1n".to_string()),
    }
}

fn credit_request() -> CreditValidationRequest {
    CreditValidationRequest {
        document_type: "CC".to_string(),
        document_number: "1234567890".to_string(),
        first_name: "María".to_string(),
        last_name: "García".to_string(),
        birth_date: Some("1982-05-17".to_string()),
    }
}

#[tokio::test]
async fn production_identity_normalizes_provider_fields() {
    let mock_server = MockServer::start().await;

    let provider_response = serde_json::json!({
        "success": true,
        "valid": true,
        "data": {
            "numero_documento": "1234567890",
            "primer_nombre": "MARIA",
            "segundo_nombre": "FERNANDA",
            "primer_apellido": "GARCIA",
            "segundo_apellido": "LOPEZ",
            "fecha_nacimiento": "1982-05-17",
            "fecha_expedicion": "2000-06-01",
            "lugar_expedicion": "Bogotá D.C.",
            "sexo": "F",
            "tipo_sangre": "O+",
            "validacion_biometrica": { "coincide": true, "score": 95 }
        }
    });

    Mock::given(method("POST"))
        .and(path("/v1/validate"))
        .and(header("X-Client-ID", "test_client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&provider_response))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = IdentityService::new(&config);

    let response = service.validate(&identity_request()).await;
    assert!(response.success);
    assert!(response.valid);

    let data = response.data.unwrap();
    assert_eq!(data.first_name, "MARIA FERNANDA");
    assert_eq!(data.last_name, "GARCIA LOPEZ");
    assert_eq!(data.gender, "F");
    assert_eq!(data.blood_type.as_deref(), Some("O+"));
    assert!(data.biometric_match);
    assert_eq!(data.biometric_score, 95);
}

#[tokio::test]
async fn identity_provider_outage_becomes_failure_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/validate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = IdentityService::new(&config);

    // Transport problems come back in-band, never as Err.
    let response = service.validate(&identity_request()).await;
    assert!(!response.success);
    assert!(!response.valid);
    assert!(response.data.is_none());
    assert!(response.message.contains("Registraduría"));
}

#[tokio::test]
async fn credit_fan_out_averages_both_bureaus() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/credit-report"))
        .and(header("X-API-Key", "test_dc_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "score": 700,
            "fecha_reporte": "2025-08-14",
            "cuentas_totales": 5,
            "cuentas_activas": 3,
            "cuentas_mora": 0,
            "deuda_total": 12_000_000,
            "pago_mensual": 850_000,
            "pagos_tardios": 1
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/credit-score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "credit_score": 680,
            "report_date": "2025-08-14",
            "total_accounts": 4,
            "active_accounts": 2,
            "delinquent_accounts": 0
        })))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = CreditService::new(&config);

    let response = service.validate(&credit_request()).await;
    assert!(response.success);
    assert_eq!(response.data.score, 690);
    assert_eq!(response.data.rating, CreditRating::Fair);
    assert_eq!(response.data.decision, CreditDecision::Approved);

    assert_eq!(response.data.bureaus.len(), 2);
    assert_eq!(response.data.bureaus[0].name, "DataCrédito");
    assert_eq!(response.data.bureaus[0].score, 700);
    assert_eq!(response.data.bureaus[1].name, "TransUnion");
    assert_eq!(response.data.bureaus[1].score, 680);
    assert_eq!(response.data.summary.total_accounts, 9);
}

#[tokio::test]
async fn single_bureau_failure_degrades_to_zero_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/credit-report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "score": 700,
            "fecha_reporte": "2025-08-14"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/credit-score"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = CreditService::new(&config);

    let response = service.validate(&credit_request()).await;
    assert!(!response.success);
    assert_eq!(response.data.score, 0);
    assert_eq!(response.data.decision, CreditDecision::Rejected);
    assert!(response.data.bureaus.is_empty());
}

#[tokio::test]
async fn contract_email_posts_once_with_four_attachments() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "messageId": "msg-123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = EmailService::new(&config);

    let data = ContractEmailData {
        client_name: "María García López".to_string(),
        client_email: "maria.garcia@example.com".to_string(),
        document_number: "1234567890".to_string(),
        contract_number: "CONT-2025-0148".to_string(),
        service_name: "Combo Triple Plus".to_string(),
        service_price: 220000,
        service_features: vec![
            "Internet 500 Mbps".to_string(),
            "Plan móvil ilimitado".to_string(),
        ],
        activation_date: "17/08/2025".to_string(),
        monthly_payment_date: "5".to_string(),
        attachments: ContractAttachments::default(),
    };

    let receipt = service.send_contract_email(&data).await.unwrap();
    assert_eq!(receipt.message_id, "msg-123");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["to"], "maria.garcia@example.com");

    let attachments = body["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 4);
    assert_eq!(attachments[0]["name"], "Contrato_Firmado.pdf");
    assert_eq!(attachments[1]["name"], "Terminos_y_Condiciones.pdf");
    assert_eq!(attachments[2]["name"], "Documento_Identidad.pdf");
    assert_eq!(attachments[3]["name"], "Comprobante_Domicilio.pdf");

    let html = body["htmlContent"].as_str().unwrap();
    assert!(html.contains("$ 220.000"));
    assert!(html.contains("CONT-2025-0148"));
}

/// A record that has made it through signing, ready for closure.
fn signed_record() -> CaseRecord {
    let offer = steps::service_catalog()
        .into_iter()
        .find(|o| o.id == "combo-triple-plus")
        .unwrap();
    CaseRecord {
        document_type: Some("CC".to_string()),
        document_number: Some("1234567890".to_string()),
        identity: Some(mock_person("1234567890", 93)),
        enrollment: Some(EnrollmentForm {
            first_name: "María".to_string(),
            last_name: "García López".to_string(),
            email: "maria.garcia@example.com".to_string(),
            phone: "3001234567".to_string(),
            address: "Calle 45 # 12-34".to_string(),
            ..Default::default()
        }),
        service: Some(SelectedService {
            selected_service: offer.id.clone(),
            service_name: offer.name.clone(),
            service_price: offer.price,
            service_details: offer,
        }),
        contract: Some(Contract {
            contract_number: "CONT-2025-0042".to_string(),
            generated_at: Utc::now(),
            template: steps::CONTRACT_TEMPLATE.to_string(),
            hash: "sha256:0000000000000000000000000000000000000000000000000000000000000000"
                .to_string(),
        }),
        signature: Some(Signature {
            signed_at: Utc::now(),
            otp: "482915".to_string(),
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn close_case_sends_confirmation_then_internal_notification() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "messageId": "msg-1"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cases"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let closure_service = ClosureService::new(
        EmailService::new(&config),
        CrmService::new(&config),
        Arc::new(FixedSampler {
            matches: true,
            score: 90,
            suffix: 42,
            minutes: 11,
        }),
    );

    let data = closure_service.close_case(&signed_record()).await.unwrap();
    let StepData::Closure(closure) = data else {
        panic!("expected closure step data");
    };
    assert_eq!(closure.case_number, "CASO-0042");
    assert!(closure.email_sent);
    assert!(closure.crm_synced);

    let mails: Vec<_> = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/send-email")
        .collect();
    assert_eq!(mails.len(), 2);

    let confirmation: serde_json::Value = serde_json::from_slice(&mails[0].body).unwrap();
    assert_eq!(confirmation["to"], "maria.garcia@example.com");
    assert_eq!(confirmation["attachments"].as_array().unwrap().len(), 4);

    let notification: serde_json::Value = serde_json::from_slice(&mails[1].body).unwrap();
    assert_eq!(notification["to"], "equipo@konrad.edu.co");
    assert!(notification["subject"]
        .as_str()
        .unwrap()
        .contains("CASO-0042"));
}

#[tokio::test]
async fn relay_error_response_surfaces_as_email_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send-email"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "error": "Invalid credentials"
        })))
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let service = EmailService::new(&config);

    let data = ContractEmailData {
        client_name: "María García".to_string(),
        client_email: "maria@example.com".to_string(),
        document_number: "1234567890".to_string(),
        contract_number: "CONT-2025-0001".to_string(),
        service_name: "Internet Hogar".to_string(),
        service_price: 80000,
        service_features: vec![],
        activation_date: "17/08/2025".to_string(),
        monthly_payment_date: "5".to_string(),
        attachments: ContractAttachments::default(),
    };

    let err = service.send_contract_email(&data).await.unwrap_err();
    assert!(err.to_string().contains("Invalid credentials"));
    // The failure carries the hint suggestion for the shell's toast.
    assert!(err.to_string().contains("Credenciales inválidas"));
}

#[tokio::test]
async fn provider_transport_forwards_with_sender_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/provider/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messageId": "provider-42"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = production_config(&mock_server.uri());
    let transport = ProviderTransport::new(&config);

    let message = telco_bpms_api::mailer::EmailMessage {
        to: "maria@example.com".to_string(),
        subject: "Confirmación".to_string(),
        html_content: "<p>Hola</p>".to_string(),
        attachments: vec![],
    };

    let message_id = transport.deliver(&message).await.unwrap();
    assert_eq!(message_id, "provider-42");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["from"], "Telco <noreply@konrad.edu.co>");
    assert_eq!(body["to"], "maria@example.com");
}
