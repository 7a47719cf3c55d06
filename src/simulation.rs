//! Deterministic demo-data generation.
//!
//! Demo-mode adapters need two kinds of data: values derived deterministically
//! from the document number (so the same input always produces the same
//! person and score), and genuinely random draws (the biometric coin flip and
//! score jitter). The deterministic part lives in free functions here; the
//! random part goes through the [`Sampler`] trait so tests can pin it.

use crate::models::{
    decision_for_score, rating_for_score, BureauReport, CreditReport, CreditSummary, IdentityData,
};
use chrono::Utc;
use rand::Rng;

const FIRST_NAMES: [&str; 8] = [
    "María", "Juan", "Ana", "Carlos", "Laura", "Pedro", "Sofía", "Miguel",
];
const LAST_NAMES: [&str; 7] = [
    "García", "Rodríguez", "Martínez", "López", "González", "Pérez", "Sánchez",
];
const CITIES: [&str; 5] = ["Bogotá D.C.", "Medellín", "Cali", "Barranquilla", "Cartagena"];
const BLOOD_TYPES: [&str; 6] = ["O+", "A+", "B+", "AB+", "O-", "A-"];

/// Source of the non-deterministic draws made on the demo path.
pub trait Sampler: Send + Sync {
    /// Biometric verification outcome; the live sampler matches 90% of the time.
    fn biometric_match(&self) -> bool;
    /// Uniform draw in `[low, high)`.
    fn score_between(&self, low: u8, high: u8) -> u8;
    /// Random 4-digit numeric suffix for contract and case numbers.
    fn four_digit_suffix(&self) -> u16;
    /// Completion duration in minutes, 10-14.
    fn completion_minutes(&self) -> u32;
}

/// Default sampler backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn biometric_match(&self) -> bool {
        rand::thread_rng().gen_bool(0.9)
    }

    fn score_between(&self, low: u8, high: u8) -> u8 {
        rand::thread_rng().gen_range(low..high)
    }

    fn four_digit_suffix(&self) -> u16 {
        rand::thread_rng().gen_range(0..10000)
    }

    fn completion_minutes(&self) -> u32 {
        rand::thread_rng().gen_range(10..15)
    }
}

/// Fixed sampler for tests: always matches (or never), fixed scores.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler {
    pub matches: bool,
    pub score: u8,
    pub suffix: u16,
    pub minutes: u32,
}

impl Sampler for FixedSampler {
    fn biometric_match(&self) -> bool {
        self.matches
    }

    fn score_between(&self, low: u8, high: u8) -> u8 {
        self.score.clamp(low, high.saturating_sub(1))
    }

    fn four_digit_suffix(&self) -> u16 {
        self.suffix
    }

    fn completion_minutes(&self) -> u32 {
        self.minutes
    }
}

/// Numeric seed taken from the first six digits of the document number.
/// Returns `None` when the prefix is not numeric.
pub fn document_seed(document_number: &str) -> Option<u64> {
    let prefix: String = document_number.chars().take(6).collect();
    if prefix.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

/// Synthesizes a pseudo-person deterministically from the document number.
pub fn mock_person(document_number: &str, biometric_score: u8) -> IdentityData {
    let seed = document_seed(document_number).unwrap_or(0);
    let s = seed as usize;

    IdentityData {
        document_number: document_number.to_string(),
        first_name: FIRST_NAMES[s % FIRST_NAMES.len()].to_string(),
        last_name: format!(
            "{} {}",
            LAST_NAMES[s % LAST_NAMES.len()],
            LAST_NAMES[(s + 1) % LAST_NAMES.len()]
        ),
        birth_date: format!(
            "19{}-{:02}-{:02}",
            70 + (seed % 30),
            (seed % 12) + 1,
            (seed % 28) + 1
        ),
        expedition_date: format!(
            "20{}-{:02}-{:02}",
            10 + (seed % 15),
            (seed % 12) + 1,
            (seed % 28) + 1
        ),
        expedition_place: CITIES[s % CITIES.len()].to_string(),
        gender: if seed % 2 == 0 { "M" } else { "F" }.to_string(),
        blood_type: Some(BLOOD_TYPES[s % BLOOD_TYPES.len()].to_string()),
        biometric_match: true,
        biometric_score,
    }
}

/// Deterministic pseudo-score for the document number, always in [450, 750].
pub fn mock_credit_score(document_number: &str) -> i32 {
    let seed = document_seed(document_number).unwrap_or(0) as i64;

    let mut base = 500 + (seed % 300);
    if base > 750 {
        base = 750 - (seed % 100);
    }
    if base < 450 {
        base = 450 + (seed % 150);
    }
    base as i32
}

/// Full simulated credit report: consolidated score, per-bureau breakdown
/// with ±10 jitter, and summary aggregates, all derived from the seed.
pub fn mock_credit_report(document_number: &str) -> CreditReport {
    let seed = document_seed(document_number).unwrap_or(0) as i64;
    let score = mock_credit_score(document_number);
    let today = Utc::now().format("%Y-%m-%d").to_string();

    let data_credito_score = score + (seed % 20) as i32 - 10;
    let trans_union_score = score + ((seed + 5) % 20) as i32 - 10;

    CreditReport {
        score,
        rating: rating_for_score(score),
        decision: decision_for_score(score),
        bureaus: vec![
            BureauReport {
                name: "DataCrédito".to_string(),
                score: data_credito_score,
                report_date: today.clone(),
                accounts: 3 + (seed % 8) as u32,
                delinquencies: if score < 650 { (seed % 3) as u32 } else { 0 },
            },
            BureauReport {
                name: "TransUnion".to_string(),
                score: trans_union_score,
                report_date: today,
                accounts: 2 + (seed % 6) as u32,
                delinquencies: if score < 600 { (seed % 2) as u32 } else { 0 },
            },
        ],
        summary: CreditSummary {
            total_accounts: 5 + (seed % 10) as u32,
            active_accounts: 3 + (seed % 5) as u32,
            total_debt: (seed % 50) * 1_000_000,
            monthly_payment: (seed % 10) * 100_000,
            delinquent_accounts: if score < 650 { (seed % 2) as u32 } else { 0 },
            late_payments: if score < 700 { (seed % 5) as u32 } else { 0 },
        },
    }
}
