//! Contract confirmation email: HTML template, Base64 attachments, and the
//! client that posts the assembled message to the mail relay.
//!
//! In demo mode sending is simulated (logged and acknowledged); in production
//! the message is POSTed as JSON to the relay endpoint, which keeps provider
//! credentials off this code path.

use crate::config::{ApiMode, Config};
use crate::errors::{AppError, EmailFailureHint};
use crate::models::format_cop;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    pub name: String,
    pub content_type: String,
    /// Base64 payload.
    pub content_bytes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_content: String,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReceipt {
    pub success: bool,
    pub message_id: String,
}

/// Everything the contract confirmation template needs.
#[derive(Debug, Clone)]
pub struct ContractEmailData {
    pub client_name: String,
    pub client_email: String,
    pub document_number: String,
    pub contract_number: String,
    pub service_name: String,
    pub service_price: i64,
    pub service_features: Vec<String>,
    pub activation_date: String,
    pub monthly_payment_date: String,
    pub attachments: ContractAttachments,
}

/// Base64 payloads for the four attachment slots. Missing slots are filled
/// with demo PDFs at send time.
#[derive(Debug, Clone, Default)]
pub struct ContractAttachments {
    pub contract: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub identity_document: Option<String>,
    pub proof_of_address: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum DemoPdfKind {
    Contract,
    Terms,
    Identity,
    Address,
}

/// Placeholder PDF payload used when a real document is not on the record.
pub fn generate_demo_pdf(kind: DemoPdfKind) -> String {
    let header = match kind {
        DemoPdfKind::Contract => "CONTRATO DE SERVICIOS TELCO",
        DemoPdfKind::Terms => "TÉRMINOS Y CONDICIONES",
        DemoPdfKind::Identity => "DOCUMENTO DE IDENTIDAD",
        DemoPdfKind::Address => "COMPROBANTE DE DOMICILIO",
    };
    let body = format!(
        "========================================\n\
         {}\n\
         ========================================\n\n\
         Telecomunicaciones Konrad Lorenz\n\n\
         Este es un documento de demostración.\n\
         En producción, aquí iría el PDF real.\n\n\
         Fecha: {}\n\n\
         ========================================\n",
        header,
        Utc::now().format("%d/%m/%Y")
    );
    BASE64.encode(body)
}

/// Orders the four attachment slots into named PDF attachments.
pub fn prepare_attachments(attachments: &ContractAttachments) -> Vec<EmailAttachment> {
    let slots = [
        ("Contrato_Firmado.pdf", &attachments.contract),
        ("Terminos_y_Condiciones.pdf", &attachments.terms_and_conditions),
        ("Documento_Identidad.pdf", &attachments.identity_document),
        ("Comprobante_Domicilio.pdf", &attachments.proof_of_address),
    ];

    slots
        .into_iter()
        .filter_map(|(name, payload)| {
            payload.as_ref().map(|bytes| EmailAttachment {
                name: name.to_string(),
                content_type: "application/pdf".to_string(),
                content_bytes: bytes.clone(),
            })
        })
        .collect()
}

/// Renders the confirmation email HTML from the fixed template.
pub fn generate_contract_email(data: &ContractEmailData) -> String {
    let features = data
        .service_features
        .iter()
        .map(|f| format!("<li>{}</li>", f))
        .collect::<String>();

    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Confirmación de Contrato - Telecomunicaciones Konrad Lorenz</title>
  <style>
    body {{ margin: 0; padding: 0; font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f3f4f6; color: #1f2937; }}
    .container {{ max-width: 600px; margin: 0 auto; background-color: #ffffff; }}
    .header {{ background: linear-gradient(135deg, #3b82f6 0%, #1e40af 100%); padding: 40px 30px; text-align: center; }}
    .logo {{ font-size: 28px; font-weight: bold; color: #ffffff; margin-bottom: 10px; }}
    .header-subtitle {{ color: #e0e7ff; font-size: 16px; }}
    .content {{ padding: 40px 30px; }}
    .greeting {{ font-size: 24px; font-weight: 600; margin-bottom: 20px; }}
    .message {{ font-size: 16px; line-height: 1.6; color: #4b5563; margin-bottom: 30px; }}
    .info-box {{ background-color: #f9fafb; border-left: 4px solid #3b82f6; padding: 20px; margin-bottom: 30px; border-radius: 4px; }}
    .info-row {{ display: flex; justify-content: space-between; padding: 10px 0; border-bottom: 1px solid #e5e7eb; }}
    .info-row:last-child {{ border-bottom: none; }}
    .info-label {{ font-weight: 600; color: #6b7280; }}
    .info-value {{ color: #1f2937; font-weight: 500; }}
    .service-box {{ background: linear-gradient(135deg, #f0f9ff 0%, #e0f2fe 100%); border: 2px solid #3b82f6; border-radius: 8px; padding: 24px; margin-bottom: 30px; }}
    .service-title {{ font-size: 20px; font-weight: 700; color: #1e40af; margin-bottom: 10px; }}
    .service-price {{ font-size: 28px; font-weight: 800; color: #3b82f6; margin-bottom: 20px; }}
    .features-list {{ list-style: none; padding: 0; margin: 0; }}
    .features-list li {{ padding: 8px 0; padding-left: 28px; position: relative; }}
    .features-list li:before {{ content: "✓"; position: absolute; left: 0; color: #10b981; font-weight: bold; }}
    .documents-section {{ background-color: #fef3c7; border: 2px solid #f59e0b; border-radius: 8px; padding: 20px; margin-bottom: 30px; }}
    .documents-title {{ font-size: 18px; font-weight: 700; color: #92400e; margin-bottom: 15px; }}
    .footer {{ background-color: #1f2937; padding: 30px; text-align: center; }}
    .footer-text {{ color: #9ca3af; font-size: 14px; line-height: 1.6; }}
  </style>
</head>
<body>
  <div class="container">
    <div class="header">
      <div class="logo">📡 Telecomunicaciones Konrad Lorenz</div>
      <div class="header-subtitle">Tu Conexión al Futuro</div>
    </div>
    <div class="content">
      <div class="greeting">¡Bienvenido, {client_name}! 🎉</div>
      <div class="message">
        Nos complace confirmar que tu contrato ha sido <strong>procesado exitosamente</strong>.
        A continuación encontrarás todos los detalles de tu nueva contratación con
        Telecomunicaciones Konrad Lorenz.
      </div>
      <div class="info-box">
        <div class="info-row"><span class="info-label">Número de Contrato:</span><span class="info-value">{contract_number}</span></div>
        <div class="info-row"><span class="info-label">Cliente:</span><span class="info-value">{client_name}</span></div>
        <div class="info-row"><span class="info-label">Documento:</span><span class="info-value">{document_number}</span></div>
        <div class="info-row"><span class="info-label">Fecha de Activación:</span><span class="info-value">{activation_date}</span></div>
        <div class="info-row"><span class="info-label">Fecha de Pago:</span><span class="info-value">{payment_date} de cada mes</span></div>
      </div>
      <div class="service-box">
        <div class="service-title">{service_name}</div>
        <div class="service-price">{service_price}/mes</div>
        <ul class="features-list">{features}</ul>
      </div>
      <div class="documents-section">
        <div class="documents-title">📄 Documentos Adjuntos</div>
        <ul>
          <li>✓ Contrato de Servicios Firmado Digitalmente</li>
          <li>✓ Términos y Condiciones</li>
          <li>✓ Copia de Documento de Identidad</li>
          <li>✓ Comprobante de Domicilio</li>
        </ul>
      </div>
      <div class="message">
        <strong>Activación del Servicio:</strong> Tu servicio será activado dentro de las
        próximas 48-72 horas hábiles. Nuestro equipo técnico se comunicará contigo en las
        próximas 24 horas para coordinar la instalación.
      </div>
    </div>
    <div class="footer">
      <div class="footer-text">
        <strong>Telecomunicaciones Konrad Lorenz</strong><br>
        Carrera 9 Bis No. 62-43, Bogotá D.C., Colombia<br>
        Línea de atención: (601) 347 2311 | WhatsApp: +57 300 123 4567<br>
        Email: soporte@konrad.edu.co
      </div>
    </div>
  </div>
</body>
</html>
"#,
        client_name = data.client_name,
        contract_number = data.contract_number,
        document_number = data.document_number,
        activation_date = data.activation_date,
        payment_date = data.monthly_payment_date,
        service_name = data.service_name,
        service_price = format_cop(data.service_price),
        features = features,
    )
}

/// Builds the `EmailError` surfaced to the shell: the raw failure plus the
/// hint suggestion shown in the toast.
fn email_failure(message: String) -> AppError {
    let hint = EmailFailureHint::from_message(&message);
    tracing::error!("Email delivery failed: {} ({:?})", message, hint);
    AppError::EmailError(format!("{}. {}", message, hint.suggestion()))
}

pub struct EmailService {
    client: Client,
    config: Config,
}

impl EmailService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    /// Sends a message through the relay. Demo mode logs and acknowledges.
    pub async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, AppError> {
        if self.config.mode == ApiMode::Demo {
            tokio::time::sleep(self.config.latencies.email).await;
            tracing::info!(
                "[DEMO] Email to {} ({} attachments): {}",
                message.to,
                message.attachments.len(),
                message.subject
            );
            return Ok(EmailReceipt {
                success: true,
                message_id: format!("demo-{}", uuid::Uuid::new_v4()),
            });
        }

        let url = format!("{}/api/send-email", self.config.email.relay_url);
        tracing::info!("Posting email for {} to relay", message.to);

        let response = self
            .client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|e| email_failure(format!("Relay request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({ "error": "Error desconocido" }));

        if !status.is_success() {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Error desconocido");
            return Err(email_failure(format!(
                "Error enviando email ({}): {}",
                status, error
            )));
        }

        let message_id = body
            .get("messageId")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        tracing::info!("Email sent through relay, message id {}", message_id);

        Ok(EmailReceipt {
            success: true,
            message_id,
        })
    }

    /// Builds and sends the contract confirmation. Empty attachment slots are
    /// filled with demo PDFs so the client always receives all four documents.
    pub async fn send_contract_email(
        &self,
        data: &ContractEmailData,
    ) -> Result<EmailReceipt, AppError> {
        let mut attachments = data.attachments.clone();
        if attachments.contract.is_none() {
            attachments.contract = Some(generate_demo_pdf(DemoPdfKind::Contract));
        }
        if attachments.terms_and_conditions.is_none() {
            attachments.terms_and_conditions = Some(generate_demo_pdf(DemoPdfKind::Terms));
        }
        if attachments.identity_document.is_none() {
            attachments.identity_document = Some(generate_demo_pdf(DemoPdfKind::Identity));
        }
        if attachments.proof_of_address.is_none() {
            attachments.proof_of_address = Some(generate_demo_pdf(DemoPdfKind::Address));
        }

        let message = EmailMessage {
            to: data.client_email.clone(),
            subject: format!(
                "Confirmación de Contrato {} - Telecomunicaciones Konrad Lorenz",
                data.contract_number
            ),
            html_content: generate_contract_email(data),
            attachments: prepare_attachments(&attachments),
        };

        self.send(&message).await
    }

    /// Notifies the internal team about a newly closed case. Best-effort.
    pub async fn send_internal_notification(
        &self,
        case_number: &str,
        client_name: &str,
        document_number: &str,
    ) -> bool {
        let message = EmailMessage {
            to: "equipo@konrad.edu.co".to_string(),
            subject: format!("Nuevo Caso Creado: {}", case_number),
            html_content: format!(
                "<h2>Nuevo Caso en el Sistema BPMS</h2>\
                 <p><strong>ID del Caso:</strong> {}</p>\
                 <p><strong>Cliente:</strong> {}</p>\
                 <p><strong>Documento:</strong> {}</p>\
                 <p><strong>Fecha de Creación:</strong> {}</p>",
                case_number,
                client_name,
                document_number,
                Utc::now().format("%d/%m/%Y %H:%M")
            ),
            attachments: vec![],
        };

        match self.send(&message).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Internal notification failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> ContractEmailData {
        ContractEmailData {
            client_name: "María García".to_string(),
            client_email: "maria@example.com".to_string(),
            document_number: "1234567890".to_string(),
            contract_number: "CONT-2025-0042".to_string(),
            service_name: "Combo Triple Plus".to_string(),
            service_price: 220000,
            service_features: vec!["Internet 500 Mbps".to_string()],
            activation_date: "1 de septiembre de 2026".to_string(),
            monthly_payment_date: "5".to_string(),
            attachments: ContractAttachments::default(),
        }
    }

    #[test]
    fn template_includes_contract_and_formatted_price() {
        let html = generate_contract_email(&sample_data());
        assert!(html.contains("CONT-2025-0042"));
        assert!(html.contains("$ 220.000/mes"));
        assert!(html.contains("María García"));
        assert!(html.contains("Internet 500 Mbps"));
    }

    #[test]
    fn all_four_slots_become_named_pdf_attachments() {
        let attachments = ContractAttachments {
            contract: Some(generate_demo_pdf(DemoPdfKind::Contract)),
            terms_and_conditions: Some(generate_demo_pdf(DemoPdfKind::Terms)),
            identity_document: Some(generate_demo_pdf(DemoPdfKind::Identity)),
            proof_of_address: Some(generate_demo_pdf(DemoPdfKind::Address)),
        };
        let prepared = prepare_attachments(&attachments);
        assert_eq!(prepared.len(), 4);
        assert_eq!(prepared[0].name, "Contrato_Firmado.pdf");
        assert!(prepared.iter().all(|a| a.content_type == "application/pdf"));
    }

    #[test]
    fn failures_carry_a_user_facing_suggestion() {
        let err = email_failure("Error enviando email (401): Invalid credentials".to_string());
        assert!(err.to_string().contains("Invalid credentials"));
        assert!(err.to_string().contains("Credenciales inválidas"));

        let err = email_failure("Relay request failed: connection refused".to_string());
        assert!(err.to_string().contains("Error de conexión"));
    }

    #[test]
    fn missing_slots_are_skipped_by_prepare() {
        let attachments = ContractAttachments {
            contract: Some(generate_demo_pdf(DemoPdfKind::Contract)),
            ..Default::default()
        };
        assert_eq!(prepare_attachments(&attachments).len(), 1);
    }
}
