//! OTP issuance and verification behind an explicit provider seam.
//!
//! The signing step needs a one-time code delivered out of band. The demo
//! provider issues a random six-digit code with a short TTL and single-use
//! verification; a production deployment plugs a real SMS provider into the
//! same trait.

use async_trait::async_trait;
use moka::future::Cache;
use rand::Rng;
use std::time::Duration;

/// A code issued for one signing attempt.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    /// Phone number the code was (notionally) delivered to.
    pub phone: String,
    /// Present only in demo mode so the UI can display it.
    pub demo_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpVerification {
    Valid,
    Invalid,
    Expired,
}

#[async_trait]
pub trait OtpProvider: Send + Sync {
    /// Issues and delivers a code for the given phone number.
    async fn request_otp(&self, phone: &str) -> OtpChallenge;

    /// Verifies a submitted code. Codes are single-use: a successful
    /// verification consumes the challenge.
    async fn verify(&self, phone: &str, code: &str) -> OtpVerification;
}

/// Demo provider: codes are generated locally, cached with a 5 minute TTL,
/// and surfaced in the challenge for on-screen display.
pub struct DemoOtpProvider {
    codes: Cache<String, String>,
    send_delay: Duration,
}

impl DemoOtpProvider {
    pub fn new(send_delay: Duration) -> Self {
        Self {
            codes: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
            send_delay,
        }
    }
}

#[async_trait]
impl OtpProvider for DemoOtpProvider {
    async fn request_otp(&self, phone: &str) -> OtpChallenge {
        tokio::time::sleep(self.send_delay).await;

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        self.codes.insert(phone.to_string(), code.clone()).await;

        tracing::info!("OTP issued for {} (demo)", phone);
        OtpChallenge {
            phone: phone.to_string(),
            demo_code: Some(code),
        }
    }

    async fn verify(&self, phone: &str, code: &str) -> OtpVerification {
        match self.codes.get(phone).await {
            Some(expected) if expected == code => {
                // Single use.
                self.codes.invalidate(phone).await;
                OtpVerification::Valid
            }
            Some(_) => OtpVerification::Invalid,
            None => OtpVerification::Expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_code_verifies_once() {
        let provider = DemoOtpProvider::new(Duration::ZERO);
        let challenge = provider.request_otp("+57 300 123 4567").await;
        let code = challenge.demo_code.expect("demo code present");
        assert_eq!(code.len(), 6);

        assert_eq!(
            provider.verify("+57 300 123 4567", &code).await,
            OtpVerification::Valid
        );
        // Consumed on success.
        assert_eq!(
            provider.verify("+57 300 123 4567", &code).await,
            OtpVerification::Expired
        );
    }

    #[tokio::test]
    async fn wrong_code_is_invalid_and_not_consumed() {
        let provider = DemoOtpProvider::new(Duration::ZERO);
        let challenge = provider.request_otp("3001234567").await;
        let code = challenge.demo_code.unwrap();

        assert_eq!(
            provider.verify("3001234567", "000000").await,
            OtpVerification::Invalid
        );
        assert_eq!(
            provider.verify("3001234567", &code).await,
            OtpVerification::Valid
        );
    }

    #[tokio::test]
    async fn unknown_phone_is_expired() {
        let provider = DemoOtpProvider::new(Duration::ZERO);
        assert_eq!(
            provider.verify("3009999999", "123456").await,
            OtpVerification::Expired
        );
    }
}
