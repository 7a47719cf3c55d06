use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============ Identity validation envelopes ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityValidationRequest {
    pub document_type: String,
    pub document_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_photo: Option<String>,
}

/// Person data returned by the identity provider on a successful match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityData {
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub expedition_date: String,
    pub expedition_place: String,
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    pub biometric_match: bool,
    /// 0-100
    pub biometric_score: u8,
}

/// Immutable response envelope; constructed once by the adapter, then only
/// read and merged into the case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityValidationResponse {
    pub success: bool,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<IdentityData>,
    pub provider: String,
    pub response_time: u64,
    pub timestamp: DateTime<Utc>,
}

// ============ Credit validation envelopes ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditValidationRequest {
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditRating {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditDecision {
    Approved,
    ManualReview,
    Rejected,
}

/// One bureau's contribution to the aggregate decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BureauReport {
    pub name: String,
    pub score: i32,
    pub report_date: String,
    pub accounts: u32,
    pub delinquencies: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub total_accounts: u32,
    pub active_accounts: u32,
    pub total_debt: i64,
    pub monthly_payment: i64,
    pub delinquent_accounts: u32,
    pub late_payments: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditReport {
    /// 300-850 range in production; simulated scores stay within 450-750.
    pub score: i32,
    pub rating: CreditRating,
    pub decision: CreditDecision,
    pub bureaus: Vec<BureauReport>,
    pub summary: CreditSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditValidationResponse {
    pub success: bool,
    pub data: CreditReport,
    pub timestamp: DateTime<Utc>,
}

impl CreditValidationResponse {
    /// Envelope synthesized when a bureau query fails: zero score, rejected,
    /// no bureau detail. The flow treats this as a terminal negative, not an
    /// exception.
    pub fn zero_rejection() -> Self {
        Self {
            success: false,
            data: CreditReport {
                score: 0,
                rating: CreditRating::VeryPoor,
                decision: CreditDecision::Rejected,
                bureaus: vec![],
                summary: CreditSummary {
                    total_accounts: 0,
                    active_accounts: 0,
                    total_debt: 0,
                    monthly_payment: 0,
                    delinquent_accounts: 0,
                    late_payments: 0,
                },
            },
            timestamp: Utc::now(),
        }
    }
}

/// Fixed business rule table mapping a consolidated score to its rating.
pub fn rating_for_score(score: i32) -> CreditRating {
    if score >= 750 {
        CreditRating::Excellent
    } else if score >= 700 {
        CreditRating::Good
    } else if score >= 650 {
        CreditRating::Fair
    } else if score >= 580 {
        CreditRating::Poor
    } else {
        CreditRating::VeryPoor
    }
}

/// Fixed business rule table mapping a consolidated score to the decision.
pub fn decision_for_score(score: i32) -> CreditDecision {
    if score >= 650 {
        CreditDecision::Approved
    } else if score >= 580 {
        CreditDecision::ManualReview
    } else {
        CreditDecision::Rejected
    }
}

// ============ Enrollment ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentForm {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub department: String,
}

// ============ Document upload ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Cedula,
    Comprobante,
    Rut,
    Referencias,
}

impl DocumentKind {
    pub fn display_name(self) -> &'static str {
        match self {
            DocumentKind::Cedula => "Cédula de Ciudadanía (Frente y Reverso)",
            DocumentKind::Comprobante => "Comprobante de Domicilio",
            DocumentKind::Rut => "RUT (Registro Único Tributario)",
            DocumentKind::Referencias => "Referencias Personales",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, DocumentKind::Cedula | DocumentKind::Comprobante)
    }

    pub fn all() -> [DocumentKind; 4] {
        [
            DocumentKind::Cedula,
            DocumentKind::Comprobante,
            DocumentKind::Rut,
            DocumentKind::Referencias,
        ]
    }
}

/// A single uploaded document: opaque payload plus its integrity hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub kind: DocumentKind,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
    /// `sha256:<hex>` over the payload.
    pub checksum: String,
    /// Base64 payload, carried so the closure step can attach it.
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBundle {
    pub documents: Vec<UploadedDocument>,
    pub consent_given: bool,
}

impl DocumentBundle {
    pub fn get(&self, kind: DocumentKind) -> Option<&UploadedDocument> {
        self.documents.iter().find(|d| d.kind == kind)
    }
}

// ============ Service selection ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffer {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Monthly price in Colombian pesos.
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<i64>,
    pub features: Vec<String>,
    #[serde(default)]
    pub popular: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Component service ids for bundles; empty for individual services.
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedService {
    pub selected_service: String,
    pub service_name: String,
    pub service_price: i64,
    pub service_details: ServiceOffer,
}

// ============ Contract and signature ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_number: String,
    pub generated_at: DateTime<Utc>,
    pub template: String,
    /// `sha256:<hex>` over the rendered contract body.
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub signed_at: DateTime<Utc>,
    pub otp: String,
}

// ============ Case closure ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseClosure {
    pub case_number: String,
    /// Minutes from case start to completion.
    pub completion_minutes: u32,
    pub email_sent: bool,
    pub crm_synced: bool,
}

// ============ Case record (accumulator) ============

/// The mutable record threaded through the wizard. Each step appends its own
/// section and never touches an earlier one; the record has no identity until
/// closure mints a case number. It lives only for the duration of one flow
/// and is destroyed on reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_photo: Option<String>,
    pub identity: Option<IdentityData>,
    pub enrollment: Option<EnrollmentForm>,
    pub documents: Option<DocumentBundle>,
    pub credit: Option<CreditValidationResponse>,
    pub service: Option<SelectedService>,
    pub contract: Option<Contract>,
    pub signature: Option<Signature>,
    pub closure: Option<CaseClosure>,
}

impl CaseRecord {
    /// Client's full name once identity or enrollment data exists.
    pub fn client_name(&self) -> Option<String> {
        if let Some(enrollment) = &self.enrollment {
            return Some(format!("{} {}", enrollment.first_name, enrollment.last_name));
        }
        self.identity
            .as_ref()
            .map(|id| format!("{} {}", id.first_name, id.last_name))
    }

    pub fn client_email(&self) -> Option<&str> {
        self.enrollment.as_ref().map(|e| e.email.as_str())
    }
}

// ============ Shared validation ============

/// Email-shaped check used by both the enrollment gate and the mail relay.
pub fn email_format_regex() -> Regex {
    // Pattern is a compile-time literal.
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
}

// ============ Presentation helpers ============

/// Formats an amount as Colombian pesos without decimals: `$ 220.000`.
pub fn format_cop(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-$ {}", grouped)
    } else {
        format!("$ {}", grouped)
    }
}

pub fn rating_label(rating: CreditRating) -> &'static str {
    match rating {
        CreditRating::Excellent => "Excelente",
        CreditRating::Good => "Bueno",
        CreditRating::Fair => "Regular",
        CreditRating::Poor => "Bajo",
        CreditRating::VeryPoor => "Muy Bajo",
    }
}

pub fn decision_label(decision: CreditDecision) -> &'static str {
    match decision {
        CreditDecision::Approved => "Aprobado",
        CreditDecision::ManualReview => "Revisión Manual",
        CreditDecision::Rejected => "Rechazado",
    }
}
