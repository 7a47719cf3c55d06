//! Supervision portal data and read-only endpoints: the case list, the audit
//! trail, and the commercial catalog. The portal is demo-backed; the dataset
//! is fixed and filtering happens in memory.

use crate::steps::service_catalog;
use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    Completado,
    EnProceso,
    Rechazado,
    PendienteDocumentos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_number: String,
    pub client_name: String,
    pub document_number: String,
    pub service: String,
    pub status: CaseStatus,
    pub created_at: String,
    pub advisor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: String,
    pub user: String,
    pub action: String,
    pub case_number: String,
    pub details: String,
}

/// Fixed demo dataset backing the case list.
pub fn mock_cases() -> Vec<CaseSummary> {
    let rows: [(&str, &str, &str, &str, CaseStatus, &str, &str); 8] = [
        (
            "CASO-001",
            "María García López",
            "1234567890",
            "Combo Triple",
            CaseStatus::Completado,
            "2025-08-10 09:15",
            "Carlos Mendoza",
        ),
        (
            "CASO-002",
            "Juan Rodríguez Pérez",
            "9876543210",
            "Internet Hogar",
            CaseStatus::Completado,
            "2025-08-11 10:42",
            "Carlos Mendoza",
        ),
        (
            "CASO-003",
            "Ana Martínez Sánchez",
            "4567891230",
            "Combo Triple Plus",
            CaseStatus::EnProceso,
            "2025-08-12 11:05",
            "Patricia Rojas",
        ),
        (
            "CASO-004",
            "Carlos López González",
            "7891234560",
            "Telefonía Móvil",
            CaseStatus::Rechazado,
            "2025-08-12 15:30",
            "Carlos Mendoza",
        ),
        (
            "CASO-005",
            "Laura González Ruiz",
            "3216549870",
            "Dúo Internet + TV",
            CaseStatus::Completado,
            "2025-08-13 08:58",
            "Patricia Rojas",
        ),
        (
            "CASO-006",
            "Pedro Sánchez Torres",
            "6549873210",
            "Televisión Digital",
            CaseStatus::PendienteDocumentos,
            "2025-08-13 14:20",
            "Carlos Mendoza",
        ),
        (
            "CASO-007",
            "Sofía Pérez Ramírez",
            "1597534860",
            "Dúo Internet + Telefonía",
            CaseStatus::EnProceso,
            "2025-08-14 09:47",
            "Patricia Rojas",
        ),
        (
            "CASO-008",
            "Miguel Martínez Castro",
            "7534861590",
            "Combo Triple",
            CaseStatus::Completado,
            "2025-08-14 16:12",
            "Carlos Mendoza",
        ),
    ];

    rows.into_iter()
        .map(
            |(case_number, client_name, document_number, service, status, created_at, advisor)| {
                CaseSummary {
                    case_number: case_number.to_string(),
                    client_name: client_name.to_string(),
                    document_number: document_number.to_string(),
                    service: service.to_string(),
                    status,
                    created_at: created_at.to_string(),
                    advisor: advisor.to_string(),
                }
            },
        )
        .collect()
}

/// Fixed demo audit trail.
pub fn mock_audit_log() -> Vec<AuditEntry> {
    let rows: [(&str, &str, &str, &str, &str, &str); 13] = [
        (
            "AUD-001", "2025-08-10 09:15", "Carlos Mendoza", "Caso creado", "CASO-001",
            "Inicio del flujo de contratación",
        ),
        (
            "AUD-002", "2025-08-10 09:18", "Carlos Mendoza", "Identidad validada", "CASO-001",
            "Verificación biométrica exitosa (score 94)",
        ),
        (
            "AUD-003", "2025-08-10 09:24", "Carlos Mendoza", "Documentos cargados", "CASO-001",
            "Cédula y comprobante de domicilio recibidos",
        ),
        (
            "AUD-004", "2025-08-10 09:26", "Sistema", "Validación crediticia", "CASO-001",
            "Score consolidado 656 - Aprobado",
        ),
        (
            "AUD-005", "2025-08-10 09:29", "Carlos Mendoza", "Contrato generado", "CASO-001",
            "Contrato CONT-2025-0148 (Combo Triple)",
        ),
        (
            "AUD-006", "2025-08-10 09:31", "Sistema", "Contrato firmado", "CASO-001",
            "Firma digital con OTP verificado",
        ),
        (
            "AUD-007", "2025-08-10 09:32", "Sistema", "Caso cerrado", "CASO-001",
            "Email de confirmación enviado, sincronizado con CRM",
        ),
        (
            "AUD-008", "2025-08-11 10:42", "Carlos Mendoza", "Caso creado", "CASO-002",
            "Inicio del flujo de contratación",
        ),
        (
            "AUD-009", "2025-08-12 11:05", "Patricia Rojas", "Caso creado", "CASO-003",
            "Inicio del flujo de contratación",
        ),
        (
            "AUD-010", "2025-08-12 15:34", "Sistema", "Validación crediticia", "CASO-004",
            "Score consolidado 512 - Rechazado",
        ),
        (
            "AUD-011", "2025-08-12 15:35", "Carlos Mendoza", "Caso rechazado", "CASO-004",
            "Cliente no cumple requisitos crediticios",
        ),
        (
            "AUD-012", "2025-08-13 14:25", "Carlos Mendoza", "Documentos pendientes", "CASO-006",
            "Falta comprobante de domicilio",
        ),
        (
            "AUD-013", "2025-08-14 16:15", "Sistema", "Validación crediticia", "CASO-008",
            "Score consolidado 689 - Aprobado",
        ),
    ];

    rows.into_iter()
        .map(|(id, timestamp, user, action, case_number, details)| AuditEntry {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            user: user.to_string(),
            action: action.to_string(),
            case_number: case_number.to_string(),
            details: details.to_string(),
        })
        .collect()
}

/// Case list filter: free-text search over case number, client name and
/// document, plus an exact status match.
pub fn filter_cases(
    cases: Vec<CaseSummary>,
    search: Option<&str>,
    status: Option<CaseStatus>,
) -> Vec<CaseSummary> {
    let needle = search.map(str::to_lowercase).unwrap_or_default();
    cases
        .into_iter()
        .filter(|case| {
            let matches_search = needle.is_empty()
                || case.case_number.to_lowercase().contains(&needle)
                || case.client_name.to_lowercase().contains(&needle)
                || case.document_number.contains(&needle);
            let matches_status = status.map(|s| case.status == s).unwrap_or(true);
            matches_search && matches_status
        })
        .collect()
}

/// The client portal view: the client's own case, if any.
pub fn client_case(case_number: &str) -> Option<CaseSummary> {
    mock_cases()
        .into_iter()
        .find(|case| case.case_number == case_number)
}

#[derive(Debug, Deserialize)]
pub struct CaseListQuery {
    pub search: Option<String>,
    pub status: Option<CaseStatus>,
}

async fn list_cases(Query(query): Query<CaseListQuery>) -> impl IntoResponse {
    let cases = filter_cases(mock_cases(), query.search.as_deref(), query.status);
    Json(json!({ "success": true, "cases": cases }))
}

async fn audit_log() -> impl IntoResponse {
    Json(json!({ "success": true, "entries": mock_audit_log() }))
}

async fn catalog() -> impl IntoResponse {
    Json(json!({ "success": true, "services": service_catalog() }))
}

/// Read-only portal routes.
pub fn portal_router() -> Router {
    Router::new()
        .route("/api/cases", get(list_cases))
        .route("/api/audit-log", get(audit_log))
        .route("/api/catalog", get(catalog))
}
