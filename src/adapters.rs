//! External service adapters: identity verification, credit bureaus, CRM.
//!
//! Each adapter is an async service with two paths. The demo path sleeps the
//! configured latency and consults the deterministic generator in
//! `simulation`; the production path performs the real HTTP call and
//! normalizes the provider's field names into our envelopes. Transport
//! failures are caught here and converted into failure-shaped responses —
//! business negatives (biometric mismatch, low score) are data, never errors.
//! No retries, no backoff.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::simulation::{self, Sampler, ThreadRngSampler};
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

fn document_format_regex() -> Regex {
    // Unwrap is safe: pattern is a compile-time literal.
    Regex::new(r"^\d{6,10}$").expect("valid document regex")
}

pub struct IdentityService {
    client: Client,
    config: Config,
    sampler: Arc<dyn Sampler>,
}

impl IdentityService {
    pub fn new(config: &Config) -> Self {
        Self::with_sampler(config, Arc::new(ThreadRngSampler))
    }

    /// Injects the sampler used for the biometric draw; tests pin it.
    pub fn with_sampler(config: &Config, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
            sampler,
        }
    }

    /// Validates a document + biometric pair against the identity provider.
    ///
    /// Never returns a transport error: failures become a failure-shaped
    /// envelope with `success=false` so the step can surface them inline.
    pub async fn validate(&self, request: &IdentityValidationRequest) -> IdentityValidationResponse {
        let started = Instant::now();

        if self.config.mode.is_demo() {
            return self.validate_simulated(request, started).await;
        }

        match self.validate_remote(request, started).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Identity validation failed: {}", e);
                IdentityValidationResponse {
                    success: false,
                    valid: false,
                    message: format!("Error al conectar con Registraduría: {}", e),
                    data: None,
                    provider: "Registraduría Nacional".to_string(),
                    response_time: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                }
            }
        }
    }

    async fn validate_simulated(
        &self,
        request: &IdentityValidationRequest,
        started: Instant,
    ) -> IdentityValidationResponse {
        tokio::time::sleep(self.config.latencies.identity).await;

        let is_valid_format = document_format_regex().is_match(&request.document_number);
        let response_time = started.elapsed().as_millis() as u64;

        if !is_valid_format {
            return IdentityValidationResponse {
                success: false,
                valid: false,
                message: "Formato de documento inválido".to_string(),
                data: None,
                provider: "Registraduría Nacional".to_string(),
                response_time,
                timestamp: Utc::now(),
            };
        }

        // 90% biometric success in demo mode.
        if !self.sampler.biometric_match() {
            let biometric_score = self.sampler.score_between(40, 70);
            tracing::warn!(
                "Simulated biometric mismatch for document {} (score {})",
                request.document_number,
                biometric_score
            );
            return IdentityValidationResponse {
                success: true,
                valid: false,
                message: "Discrepancia en verificación biométrica".to_string(),
                data: None,
                provider: "ID-TRUE / Registraduría Nacional".to_string(),
                response_time,
                timestamp: Utc::now(),
            };
        }

        let biometric_score = self.sampler.score_between(85, 100);
        let data = simulation::mock_person(&request.document_number, biometric_score);

        IdentityValidationResponse {
            success: true,
            valid: true,
            message: "Identidad verificada correctamente (MODO DEMO)".to_string(),
            data: Some(data),
            provider: "ID-TRUE / Registraduría Nacional (DEMO)".to_string(),
            response_time,
            timestamp: Utc::now(),
        }
    }

    async fn validate_remote(
        &self,
        request: &IdentityValidationRequest,
        started: Instant,
    ) -> Result<IdentityValidationResponse, AppError> {
        let url = format!("{}/v1/validate", self.config.identity.base_url);

        tracing::info!(
            "Validating identity for document {} against {}",
            request.document_number,
            self.config.identity.base_url
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.identity.api_key))
            .header("X-Client-ID", &self.config.identity.client_id)
            .json(&json!({
                "tipo_documento": request.document_type,
                "numero_documento": request.document_number,
                "imagen_documento": request.document_photo,
                "imagen_rostro": request.face_photo,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Identity request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "Identity API returned status {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse identity response: {}", e))
        })?;

        let valid = body.get("valid").and_then(Value::as_bool).unwrap_or(false);
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);

        let data = if valid {
            body.get("data").map(|d| {
                let first = d.get("primer_nombre").and_then(Value::as_str).unwrap_or("");
                let middle = d.get("segundo_nombre").and_then(Value::as_str).unwrap_or("");
                let last1 = d.get("primer_apellido").and_then(Value::as_str).unwrap_or("");
                let last2 = d.get("segundo_apellido").and_then(Value::as_str).unwrap_or("");
                IdentityData {
                    document_number: d
                        .get("numero_documento")
                        .and_then(Value::as_str)
                        .unwrap_or(&request.document_number)
                        .to_string(),
                    first_name: format!("{} {}", first, middle).trim().to_string(),
                    last_name: format!("{} {}", last1, last2).trim().to_string(),
                    birth_date: d
                        .get("fecha_nacimiento")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    expedition_date: d
                        .get("fecha_expedicion")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    expedition_place: d
                        .get("lugar_expedicion")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    gender: d
                        .get("sexo")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    blood_type: d
                        .get("tipo_sangre")
                        .and_then(Value::as_str)
                        .map(String::from),
                    biometric_match: d
                        .pointer("/validacion_biometrica/coincide")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    biometric_score: d
                        .pointer("/validacion_biometrica/score")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u8,
                }
            })
        } else {
            None
        };

        let message = if valid {
            "Identidad verificada correctamente".to_string()
        } else {
            body.get("mensaje")
                .and_then(Value::as_str)
                .unwrap_or("Identidad no verificada")
                .to_string()
        };

        Ok(IdentityValidationResponse {
            success,
            valid,
            message,
            data,
            provider: "ID-TRUE / Registraduría Nacional".to_string(),
            response_time: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }
}

pub struct CreditService {
    client: Client,
    config: Config,
}

impl CreditService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    /// Queries both bureaus and consolidates the decision.
    ///
    /// Production mode fans out to DataCredito and TransUnion concurrently
    /// and joins before computing the combined score; if either query fails
    /// the whole validation degrades to a zero-score rejection envelope.
    pub async fn validate(&self, request: &CreditValidationRequest) -> CreditValidationResponse {
        if self.config.mode.is_demo() {
            tokio::time::sleep(self.config.latencies.credit).await;
            return CreditValidationResponse {
                success: true,
                data: simulation::mock_credit_report(&request.document_number),
                timestamp: Utc::now(),
            };
        }

        match self.validate_remote(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Credit validation failed: {}", e);
                CreditValidationResponse::zero_rejection()
            }
        }
    }

    async fn validate_remote(
        &self,
        request: &CreditValidationRequest,
    ) -> Result<CreditValidationResponse, AppError> {
        tracing::info!(
            "Querying credit bureaus for document {}",
            request.document_number
        );

        // First-class fan-out/fan-in: both bureau queries in flight at once.
        let (data_credito, trans_union) = tokio::join!(
            self.query_data_credito(request),
            self.query_trans_union(request)
        );
        let data_credito = data_credito?;
        let trans_union = trans_union?;

        let dc_score = data_credito
            .get("score")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AppError::ExternalApiError("DataCredito response missing score".to_string())
            })? as i32;
        let tu_score = trans_union
            .get("credit_score")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AppError::ExternalApiError("TransUnion response missing credit_score".to_string())
            })? as i32;

        let average = ((dc_score + tu_score) as f64 / 2.0).round() as i32;

        let dc_accounts = data_credito
            .get("cuentas_totales")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let tu_accounts = trans_union
            .get("total_accounts")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let dc_delinquent = data_credito
            .get("cuentas_mora")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        Ok(CreditValidationResponse {
            success: true,
            data: CreditReport {
                score: average,
                rating: rating_for_score(average),
                decision: decision_for_score(average),
                bureaus: vec![
                    BureauReport {
                        name: "DataCrédito".to_string(),
                        score: dc_score,
                        report_date: data_credito
                            .get("fecha_reporte")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        accounts: dc_accounts,
                        delinquencies: dc_delinquent,
                    },
                    BureauReport {
                        name: "TransUnion".to_string(),
                        score: tu_score,
                        report_date: trans_union
                            .get("report_date")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        accounts: tu_accounts,
                        delinquencies: trans_union
                            .get("delinquent_accounts")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as u32,
                    },
                ],
                summary: CreditSummary {
                    total_accounts: dc_accounts + tu_accounts,
                    active_accounts: (data_credito
                        .get("cuentas_activas")
                        .and_then(Value::as_u64)
                        .unwrap_or(0)
                        + trans_union
                            .get("active_accounts")
                            .and_then(Value::as_u64)
                            .unwrap_or(0)) as u32,
                    total_debt: data_credito
                        .get("deuda_total")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                    monthly_payment: data_credito
                        .get("pago_mensual")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                    delinquent_accounts: dc_delinquent,
                    late_payments: data_credito
                        .get("pagos_tardios")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u32,
                },
            },
            timestamp: Utc::now(),
        })
    }

    async fn query_data_credito(
        &self,
        request: &CreditValidationRequest,
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}/api/v2/credit-report",
            self.config.data_credito.base_url
        );

        let mut builder = self
            .client
            .post(&url)
            .header("X-API-Key", &self.config.data_credito.api_key);
        if let Some(username) = &self.config.data_credito.username {
            builder = builder.basic_auth(username, self.config.data_credito.password.as_deref());
        }

        let response = builder
            .json(&json!({
                "tipoDocumento": request.document_type,
                "numeroDocumento": request.document_number,
                "primerNombre": request.first_name,
                "primerApellido": request.last_name,
                "fechaNacimiento": request.birth_date,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("DataCredito request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "DataCredito returned status {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse DataCredito response: {}", e))
        })
    }

    async fn query_trans_union(
        &self,
        request: &CreditValidationRequest,
    ) -> Result<Value, AppError> {
        let url = format!("{}/v1/credit-score", self.config.trans_union.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.trans_union.api_key),
            )
            .json(&json!({
                "document_type": request.document_type,
                "document_number": request.document_number,
                "first_name": request.first_name,
                "last_name": request.last_name,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("TransUnion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "TransUnion returned status {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse TransUnion response: {}", e))
        })
    }
}

pub struct CrmService {
    client: Client,
    config: Config,
}

impl CrmService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    /// Pushes the closed case to the CRM. Returns `false` on any failure;
    /// CRM sync is best-effort and never blocks case completion.
    pub async fn sync_case(&self, case: &CaseRecord) -> bool {
        if self.config.mode.is_demo() {
            tokio::time::sleep(self.config.latencies.crm).await;
            tracing::info!(
                "Case synced with CRM (DEMO): client={:?}",
                case.client_name()
            );
            return true;
        }

        let url = format!("{}/cases", self.config.crm.base_url);
        let result = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.crm.api_key))
            .json(case)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Case synced with CRM");
                true
            }
            Ok(response) => {
                tracing::error!("CRM sync returned status {}", response.status());
                false
            }
            Err(e) => {
                tracing::error!("CRM sync failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_regex_accepts_6_to_10_digits() {
        let re = document_format_regex();
        assert!(re.is_match("123456"));
        assert!(re.is_match("1234567890"));
        assert!(!re.is_match("12345"));
        assert!(!re.is_match("12345678901"));
        assert!(!re.is_match("12a456"));
        assert!(!re.is_match(""));
    }
}
