//! Per-step operations of the sales flow: input validation, the service
//! catalog, contract rendering, OTP-backed signing, and case closure.
//!
//! Each function here produces either a [`StepData`] ready for the wizard or
//! a validation failure the shell shows inline. Orchestration with external
//! services (email, CRM) lives in [`ClosureService`], which owns the
//! send-exactly-once behavior of the closing step.

use crate::adapters::CrmService;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::mailer::{ContractAttachments, ContractEmailData, EmailService};
use crate::models::*;
use crate::otp::{OtpProvider, OtpVerification};
use crate::simulation::Sampler;
use crate::wizard::StepData;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

// ============ Step 1: identity ============

/// Pre-flight checks before the identity adapter is called: document number
/// shape and both captured photos.
pub fn validate_identity_submission(request: &IdentityValidationRequest) -> Result<(), AppError> {
    if !Regex::new(r"^\d{6,10}$")
        .expect("valid document regex")
        .is_match(&request.document_number)
    {
        return Err(AppError::BadRequest(
            "El número de documento debe tener entre 6 y 10 dígitos".to_string(),
        ));
    }
    if request.document_photo.is_none() {
        return Err(AppError::BadRequest(
            "Debe capturar la foto del documento".to_string(),
        ));
    }
    if request.face_photo.is_none() {
        return Err(AppError::BadRequest(
            "Debe capturar la foto del rostro".to_string(),
        ));
    }
    Ok(())
}

/// Turns a successful identity response into step data. Failure-shaped
/// envelopes (mismatch, bad format, provider down) yield `None`; the shell
/// surfaces `response.message` and the wizard stays put.
pub fn identity_step_data(
    request: &IdentityValidationRequest,
    response: &IdentityValidationResponse,
) -> Option<StepData> {
    if !response.valid {
        return None;
    }
    response.data.as_ref().map(|identity| StepData::Identity {
        document_type: request.document_type.clone(),
        document_number: request.document_number.clone(),
        document_photo: request.document_photo.clone(),
        face_photo: request.face_photo.clone(),
        identity: identity.clone(),
    })
}

// ============ Step 2: enrollment ============

/// Field-level validation messages for the enrollment form, empty when the
/// form is acceptable.
pub fn enrollment_errors(form: &EnrollmentForm) -> Vec<String> {
    let mut errors = Vec::new();
    if form.first_name.trim().is_empty() {
        errors.push("El nombre es obligatorio".to_string());
    }
    if form.last_name.trim().is_empty() {
        errors.push("El apellido es obligatorio".to_string());
    }
    if form.email.trim().is_empty() {
        errors.push("El correo electrónico es obligatorio".to_string());
    } else if !email_format_regex().is_match(&form.email) {
        errors.push("El correo electrónico no tiene un formato válido".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("El teléfono es obligatorio".to_string());
    }
    if form.address.trim().is_empty() {
        errors.push("La dirección es obligatoria".to_string());
    }
    errors
}

pub fn enrollment_step_data(form: EnrollmentForm) -> Result<StepData, AppError> {
    let errors = enrollment_errors(&form);
    if !errors.is_empty() {
        return Err(AppError::BadRequest(errors.join("; ")));
    }
    Ok(StepData::Enrollment(form))
}

// ============ Step 3: document upload ============

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/jpg", "application/pdf"];

/// Accepts one uploaded file: size and MIME checks, then an integrity
/// checksum over the raw bytes. The payload is kept Base64-encoded so the
/// closure step can attach it to the confirmation email as-is.
pub fn ingest_document(
    kind: DocumentKind,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<UploadedDocument, AppError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(format!(
            "El archivo '{}' supera el tamaño máximo de 5MB",
            file_name
        )));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::BadRequest(format!(
            "Tipo de archivo no permitido: {}. Use JPG, PNG o PDF",
            content_type
        )));
    }

    let checksum = format!("sha256:{}", hex::encode(Sha256::digest(bytes)));
    tracing::debug!(
        "Ingested document {:?} '{}' ({} bytes, {})",
        kind,
        file_name,
        bytes.len(),
        checksum
    );

    Ok(UploadedDocument {
        kind,
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        size_bytes: bytes.len(),
        checksum,
        payload: BASE64.encode(bytes),
    })
}

/// Gate for advancing past the upload step: both required documents present
/// and the data-processing consent box checked.
pub fn documents_step_data(bundle: DocumentBundle) -> Result<StepData, AppError> {
    if !bundle.consent_given {
        return Err(AppError::BadRequest(
            "Debe autorizar el tratamiento de datos personales".to_string(),
        ));
    }
    for kind in DocumentKind::all() {
        if kind.is_required() && bundle.get(kind).is_none() {
            return Err(AppError::BadRequest(format!(
                "Falta el documento obligatorio: {}",
                kind.display_name()
            )));
        }
    }
    Ok(StepData::Documents(bundle))
}

// ============ Step 5: service selection ============

/// The fixed commercial catalog: three individual services and four bundles.
pub fn service_catalog() -> Vec<ServiceOffer> {
    vec![
        ServiceOffer {
            id: "telefonia".to_string(),
            name: "Telefonía Móvil".to_string(),
            description: "Plan pospago con llamadas ilimitadas".to_string(),
            price: 45000,
            original_price: None,
            features: vec![
                "Llamadas ilimitadas nacionales".to_string(),
                "20GB de datos".to_string(),
                "WhatsApp y redes sociales gratis".to_string(),
            ],
            popular: false,
            badge: None,
            services: vec![],
        },
        ServiceOffer {
            id: "internet".to_string(),
            name: "Internet Hogar".to_string(),
            description: "Fibra óptica de alta velocidad".to_string(),
            price: 80000,
            original_price: None,
            features: vec![
                "300 Mbps de velocidad".to_string(),
                "WiFi 6 incluido".to_string(),
                "Instalación gratis".to_string(),
            ],
            popular: true,
            badge: None,
            services: vec![],
        },
        ServiceOffer {
            id: "tv".to_string(),
            name: "Televisión Digital".to_string(),
            description: "Más de 200 canales en HD".to_string(),
            price: 55000,
            original_price: None,
            features: vec![
                "200+ canales HD".to_string(),
                "Decodificador 4K".to_string(),
                "Contenido on-demand".to_string(),
            ],
            popular: false,
            badge: None,
            services: vec![],
        },
        ServiceOffer {
            id: "duo-internet-telefonia".to_string(),
            name: "Dúo Internet + Telefonía".to_string(),
            description: "Internet hogar más línea móvil".to_string(),
            price: 110000,
            original_price: Some(125000),
            features: vec![
                "Internet 300 Mbps".to_string(),
                "Plan móvil con 20GB".to_string(),
                "Factura única".to_string(),
            ],
            popular: false,
            badge: None,
            services: vec!["internet".to_string(), "telefonia".to_string()],
        },
        ServiceOffer {
            id: "duo-internet-tv".to_string(),
            name: "Dúo Internet + TV".to_string(),
            description: "Internet hogar más televisión digital".to_string(),
            price: 120000,
            original_price: Some(135000),
            features: vec![
                "Internet 300 Mbps".to_string(),
                "200+ canales HD".to_string(),
                "Decodificador 4K incluido".to_string(),
            ],
            popular: false,
            badge: None,
            services: vec!["internet".to_string(), "tv".to_string()],
        },
        ServiceOffer {
            id: "combo-triple".to_string(),
            name: "Combo Triple".to_string(),
            description: "Internet, TV y telefonía en un solo plan".to_string(),
            price: 160000,
            original_price: Some(180000),
            features: vec![
                "Internet 300 Mbps".to_string(),
                "200+ canales HD".to_string(),
                "Plan móvil con 20GB".to_string(),
                "Factura única con descuento".to_string(),
            ],
            popular: true,
            badge: Some("20% OFF".to_string()),
            services: vec![
                "internet".to_string(),
                "tv".to_string(),
                "telefonia".to_string(),
            ],
        },
        ServiceOffer {
            id: "combo-triple-plus".to_string(),
            name: "Combo Triple Plus".to_string(),
            description: "La experiencia completa con velocidad premium".to_string(),
            price: 220000,
            original_price: Some(260000),
            features: vec![
                "Internet 500 Mbps".to_string(),
                "250+ canales HD y premium".to_string(),
                "Plan móvil ilimitado".to_string(),
                "Streaming incluido".to_string(),
                "Soporte prioritario 24/7".to_string(),
            ],
            popular: false,
            badge: Some("PREMIUM".to_string()),
            services: vec![
                "internet".to_string(),
                "tv".to_string(),
                "telefonia".to_string(),
            ],
        },
    ]
}

pub fn select_service(service_id: &str) -> Result<StepData, AppError> {
    let offer = service_catalog()
        .into_iter()
        .find(|o| o.id == service_id)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Servicio no encontrado: {}", service_id))
        })?;

    Ok(StepData::Service(SelectedService {
        selected_service: offer.id.clone(),
        service_name: offer.name.clone(),
        service_price: offer.price,
        service_details: offer,
    }))
}

// ============ Step 6: contract generation ============

pub const CONTRACT_TEMPLATE: &str = "Contrato Servicios Telco v3.2";

/// Renders the contract body from the accumulated record. The hash in the
/// [`Contract`] is computed over exactly this text.
pub fn render_contract_body(record: &CaseRecord) -> Result<String, AppError> {
    let name = record
        .client_name()
        .ok_or_else(|| AppError::BadRequest("Identidad del cliente incompleta".to_string()))?;
    let document = record
        .document_number
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Número de documento faltante".to_string()))?;
    let service = record
        .service
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Servicio no seleccionado".to_string()))?;
    let address = record
        .enrollment
        .as_ref()
        .map(|e| e.address.as_str())
        .unwrap_or("No registrada");

    Ok(format!(
        "{template}\n\
         ====================================\n\n\
         Telecomunicaciones Konrad Lorenz\n\n\
         CLIENTE: {name}\n\
         DOCUMENTO: {document}\n\
         DIRECCIÓN: {address}\n\n\
         SERVICIO CONTRATADO: {service_name}\n\
         TARIFA MENSUAL: {price}\n\n\
         El cliente acepta los términos y condiciones del servicio,\n\
         la política de tratamiento de datos personales y el cargo\n\
         mensual indicado, facturado a mes vencido.\n\n\
         Fecha de generación: {date}\n",
        template = CONTRACT_TEMPLATE,
        name = name,
        document = document,
        address = address,
        service_name = service.service_name,
        price = format_cop(service.service_price),
        date = Utc::now().format("%d/%m/%Y"),
    ))
}

/// Generates the contract: renders the body, hashes it, and mints the
/// `CONT-2025-XXXX` number.
pub async fn generate_contract(
    record: &CaseRecord,
    sampler: &dyn Sampler,
    config: &Config,
) -> Result<StepData, AppError> {
    let body = render_contract_body(record)?;

    tokio::time::sleep(config.latencies.contract).await;

    let contract = Contract {
        contract_number: format!("CONT-2025-{:04}", sampler.four_digit_suffix()),
        generated_at: Utc::now(),
        template: CONTRACT_TEMPLATE.to_string(),
        hash: format!("sha256:{}", hex::encode(Sha256::digest(body.as_bytes()))),
    };
    tracing::info!("Contract {} generated", contract.contract_number);

    Ok(StepData::Contract(contract))
}

// ============ Step 7: digital signature ============

/// Verifies the submitted OTP and, on success, produces the signature after
/// the signing delay. A wrong or expired code is a `BadRequest`.
pub async fn sign_contract(
    provider: &dyn OtpProvider,
    config: &Config,
    phone: &str,
    code: &str,
) -> Result<StepData, AppError> {
    match provider.verify(phone, code).await {
        OtpVerification::Valid => {}
        OtpVerification::Invalid => {
            return Err(AppError::BadRequest("Código OTP incorrecto".to_string()));
        }
        OtpVerification::Expired => {
            return Err(AppError::BadRequest(
                "El código OTP expiró, solicite uno nuevo".to_string(),
            ));
        }
    }

    tokio::time::sleep(config.latencies.signing).await;
    tracing::info!("Contract signed digitally");

    Ok(StepData::Signature(Signature {
        signed_at: Utc::now(),
        otp: code.to_string(),
    }))
}

// ============ Step 8: closure ============

/// Orchestrates the closing step: mints the case number, sends the
/// confirmation email exactly once, and pushes the case to the CRM.
pub struct ClosureService {
    email: EmailService,
    crm: CrmService,
    sampler: Arc<dyn Sampler>,
}

impl ClosureService {
    pub fn new(email: EmailService, crm: CrmService, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            email,
            crm,
            sampler,
        }
    }

    /// Builds the confirmation email payload from the record. Uploaded cedula
    /// and comprobante become the identity/address attachments; the contract
    /// and terms slots fall back to demo PDFs inside the mailer.
    pub fn contract_email_data(record: &CaseRecord) -> Result<ContractEmailData, AppError> {
        let name = record
            .client_name()
            .ok_or_else(|| AppError::BadRequest("Identidad del cliente incompleta".to_string()))?;
        let email = record
            .client_email()
            .ok_or_else(|| AppError::BadRequest("Correo del cliente faltante".to_string()))?
            .to_string();
        let document = record
            .document_number
            .clone()
            .ok_or_else(|| AppError::BadRequest("Número de documento faltante".to_string()))?;
        let service = record
            .service
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Servicio no seleccionado".to_string()))?;
        let contract = record
            .contract
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Contrato no generado".to_string()))?;

        let documents = record.documents.as_ref();
        let attachments = ContractAttachments {
            contract: None,
            terms_and_conditions: None,
            identity_document: documents
                .and_then(|d| d.get(DocumentKind::Cedula))
                .map(|d| d.payload.clone()),
            proof_of_address: documents
                .and_then(|d| d.get(DocumentKind::Comprobante))
                .map(|d| d.payload.clone()),
        };

        let activation = Utc::now() + ChronoDuration::days(3);

        Ok(ContractEmailData {
            client_name: name,
            client_email: email,
            document_number: document,
            contract_number: contract.contract_number.clone(),
            service_name: service.service_name.clone(),
            service_price: service.service_price,
            service_features: service.service_details.features.clone(),
            activation_date: activation.format("%d/%m/%Y").to_string(),
            monthly_payment_date: "5".to_string(),
            attachments,
        })
    }

    /// Closes the case. The confirmation email is attempted exactly once;
    /// a delivery failure is recorded in the closure, not retried, and never
    /// blocks completion. CRM sync is likewise best-effort.
    pub async fn close_case(&self, record: &CaseRecord) -> Result<StepData, AppError> {
        if record.signature.is_none() {
            return Err(AppError::BadRequest(
                "El contrato no ha sido firmado".to_string(),
            ));
        }

        let case_number = format!("CASO-{:04}", self.sampler.four_digit_suffix());
        let completion_minutes = self.sampler.completion_minutes();

        let email_sent = match Self::contract_email_data(record) {
            Ok(data) => match self.email.send_contract_email(&data).await {
                Ok(receipt) => {
                    tracing::info!(
                        "Confirmation email sent for {} (message id {})",
                        case_number,
                        receipt.message_id
                    );
                    true
                }
                Err(e) => {
                    tracing::error!("Confirmation email failed for {}: {}", case_number, e);
                    false
                }
            },
            Err(e) => {
                tracing::error!("Could not assemble confirmation email: {}", e);
                false
            }
        };

        // Heads-up to the sales team; best-effort like the CRM push.
        if let (Some(name), Some(document)) =
            (record.client_name(), record.document_number.as_deref())
        {
            self.email
                .send_internal_notification(&case_number, &name, document)
                .await;
        }

        let crm_synced = self.crm.sync_case(record).await;

        tracing::info!(
            "Case {} closed in {} minutes (email_sent={}, crm_synced={})",
            case_number,
            completion_minutes,
            email_sent,
            crm_synced
        );

        Ok(StepData::Closure(CaseClosure {
            case_number,
            completion_minutes,
            email_sent,
            crm_synced,
        }))
    }

    /// Manual resend from the closing screen. Unlike `close_case` this
    /// propagates the failure so the shell can show the suggestion.
    pub async fn resend_contract_email(&self, record: &CaseRecord) -> Result<String, AppError> {
        let data = Self::contract_email_data(record)?;
        let receipt = self
            .email
            .send_contract_email(&data)
            .await
            .context("Reenvío del correo de confirmación")?;
        Ok(receipt.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_submission_requires_both_photos() {
        let mut request = IdentityValidationRequest {
            document_type: "CC".to_string(),
            document_number: "1234567890".to_string(),
            document_photo: Some("aGVsbG8=".to_string()),
            face_photo: Some("aGVsbG8=".to_string()),
        };
        assert!(validate_identity_submission(&request).is_ok());

        request.face_photo = None;
        assert!(validate_identity_submission(&request).is_err());

        request.face_photo = Some("aGVsbG8=".to_string());
        request.document_number = "12345".to_string();
        assert!(validate_identity_submission(&request).is_err());
    }

    #[test]
    fn enrollment_flags_missing_and_malformed_fields() {
        let form = EnrollmentForm::default();
        let errors = enrollment_errors(&form);
        assert!(errors.iter().any(|e| e.contains("nombre")));
        assert!(errors.iter().any(|e| e.contains("correo")));

        let form = EnrollmentForm {
            first_name: "María".to_string(),
            last_name: "García".to_string(),
            email: "no-es-un-correo".to_string(),
            phone: "3001234567".to_string(),
            address: "Calle 1 # 2-3".to_string(),
            ..Default::default()
        };
        let errors = enrollment_errors(&form);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("formato"));
    }

    #[test]
    fn ingest_rejects_oversize_and_bad_mime() {
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(ingest_document(DocumentKind::Cedula, "cedula.pdf", "application/pdf", &big)
            .is_err());

        assert!(ingest_document(DocumentKind::Cedula, "cedula.gif", "image/gif", b"GIF89a")
            .is_err());
    }

    #[test]
    fn ingest_computes_sha256_checksum() {
        let doc = ingest_document(DocumentKind::Cedula, "cedula.pdf", "application/pdf", b"hello")
            .unwrap();
        assert_eq!(
            doc.checksum,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(doc.size_bytes, 5);
        assert_eq!(doc.payload, "aGVsbG8=");
    }

    #[test]
    fn bundle_requires_consent_and_both_mandatory_documents() {
        let cedula =
            ingest_document(DocumentKind::Cedula, "c.pdf", "application/pdf", b"c").unwrap();
        let comprobante =
            ingest_document(DocumentKind::Comprobante, "d.pdf", "application/pdf", b"d").unwrap();

        let bundle = DocumentBundle {
            documents: vec![cedula.clone()],
            consent_given: true,
        };
        assert!(documents_step_data(bundle).is_err());

        let bundle = DocumentBundle {
            documents: vec![cedula.clone(), comprobante.clone()],
            consent_given: false,
        };
        assert!(documents_step_data(bundle).is_err());

        let bundle = DocumentBundle {
            documents: vec![cedula, comprobante],
            consent_given: true,
        };
        assert!(documents_step_data(bundle).is_ok());
    }

    #[test]
    fn catalog_has_seven_offers_with_premium_bundle() {
        let catalog = service_catalog();
        assert_eq!(catalog.len(), 7);

        let premium = catalog
            .iter()
            .find(|o| o.id == "combo-triple-plus")
            .unwrap();
        assert_eq!(premium.price, 220000);
        assert_eq!(premium.original_price, Some(260000));
        assert_eq!(premium.badge.as_deref(), Some("PREMIUM"));
        assert_eq!(premium.services.len(), 3);

        assert!(select_service("combo-triple").is_ok());
        assert!(select_service("no-existe").is_err());
    }
}
