//! The case wizard: a linear eight-step state machine driving one sales case.
//!
//! The wizard owns the [`CaseRecord`] accumulator exclusively. Each step
//! submits its own section via [`StepData`]; the controller merges it and
//! advances. Retreating never rolls the accumulator back, and reset destroys
//! it. The controller enforces the gating the steps used to enforce
//! cooperatively: submitted data must belong to the current step and every
//! earlier section must already be present, so direct index manipulation
//! cannot skip a stage.

use crate::models::*;
use serde::{Deserialize, Serialize};

/// The eight stages of the sales flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    IdentityValidation,
    Enrollment,
    DocumentUpload,
    CreditValidation,
    ServiceSelection,
    ContractGeneration,
    DigitalSignature,
    CaseComplete,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::IdentityValidation,
        Step::Enrollment,
        Step::DocumentUpload,
        Step::CreditValidation,
        Step::ServiceSelection,
        Step::ContractGeneration,
        Step::DigitalSignature,
        Step::CaseComplete,
    ];

    /// 1-based position shown in the progress header.
    pub fn index(self) -> u8 {
        match self {
            Step::IdentityValidation => 1,
            Step::Enrollment => 2,
            Step::DocumentUpload => 3,
            Step::CreditValidation => 4,
            Step::ServiceSelection => 5,
            Step::ContractGeneration => 6,
            Step::DigitalSignature => 7,
            Step::CaseComplete => 8,
        }
    }

    pub fn from_index(index: u8) -> Option<Step> {
        Step::ALL.get(index.checked_sub(1)? as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::IdentityValidation => "Validación de Identidad",
            Step::Enrollment => "Enrolamiento",
            Step::DocumentUpload => "Recepción de Documentos",
            Step::CreditValidation => "Validación Crediticia",
            Step::ServiceSelection => "Selección de Servicios",
            Step::ContractGeneration => "Generación de Contrato",
            Step::DigitalSignature => "Firma Digital",
            Step::CaseComplete => "Cierre",
        }
    }

    fn next(self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }

    fn prev(self) -> Option<Step> {
        Step::from_index(self.index().wrapping_sub(1))
    }

    pub fn is_terminal(self) -> bool {
        self == Step::CaseComplete
    }
}

/// One step's contribution to the case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum StepData {
    Identity {
        document_type: String,
        document_number: String,
        document_photo: Option<String>,
        face_photo: Option<String>,
        identity: IdentityData,
    },
    Enrollment(EnrollmentForm),
    Documents(DocumentBundle),
    Credit(CreditValidationResponse),
    Service(SelectedService),
    Contract(Contract),
    Signature(Signature),
    Closure(CaseClosure),
}

impl StepData {
    /// The step this data belongs to.
    pub fn step(&self) -> Step {
        match self {
            StepData::Identity { .. } => Step::IdentityValidation,
            StepData::Enrollment(_) => Step::Enrollment,
            StepData::Documents(_) => Step::DocumentUpload,
            StepData::Credit(_) => Step::CreditValidation,
            StepData::Service(_) => Step::ServiceSelection,
            StepData::Contract(_) => Step::ContractGeneration,
            StepData::Signature(_) => Step::DigitalSignature,
            StepData::Closure(_) => Step::CaseComplete,
        }
    }
}

/// Why an `advance` was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceError {
    /// Submitted data does not belong to the current step.
    WrongStep { expected: Step, got: Step },
    /// An earlier step's section is missing (skip attempt).
    IncompletePrerequisite(Step),
}

impl std::fmt::Display for AdvanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvanceError::WrongStep { expected, got } => write!(
                f,
                "expected data for step '{}', got '{}'",
                expected.name(),
                got.name()
            ),
            AdvanceError::IncompletePrerequisite(step) => {
                write!(f, "step '{}' has not been completed", step.name())
            }
        }
    }
}

impl std::error::Error for AdvanceError {}

/// Result of a successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Data merged and the wizard moved to the given step.
    Advanced(Step),
    /// Data merged but the flow halted pending escalation (non-approved
    /// credit decision). The wizard stays on the current step.
    Halted(CreditDecision),
    /// Data merged on the terminal step; only `reset` leaves it.
    Terminal,
}

/// Cancellation scope for one step's in-flight adapter call.
///
/// A token is minted before the call and checked when the response arrives;
/// any transition in between (advance, retreat, reset) invalidates it, so a
/// late response cannot mutate state the user has already left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepToken {
    step: Step,
    epoch: u64,
}

/// Outcome of applying a tokened response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Merged(StepOutcome),
    Rejected(AdvanceError),
    /// The wizard transitioned while the call was in flight; dropped.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CaseWizard {
    step: Step,
    record: CaseRecord,
    epoch: u64,
}

impl Default for CaseWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseWizard {
    pub fn new() -> Self {
        Self {
            step: Step::IdentityValidation,
            record: CaseRecord::default(),
            epoch: 0,
        }
    }

    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn record(&self) -> &CaseRecord {
        &self.record
    }

    /// Completion percentage for the progress header, 0 at step 1 and 100 at
    /// the terminal step.
    pub fn progress_percent(&self) -> u8 {
        let idx = (self.step.index() - 1) as u32;
        ((idx * 100) / (Step::ALL.len() as u32 - 1)) as u8
    }

    /// Token scoping an adapter call to the current step and epoch.
    pub fn step_token(&self) -> StepToken {
        StepToken {
            step: self.step,
            epoch: self.epoch,
        }
    }

    /// Whether the section a step writes is present in the record.
    fn section_complete(&self, step: Step) -> bool {
        match step {
            Step::IdentityValidation => self.record.identity.is_some(),
            Step::Enrollment => self.record.enrollment.is_some(),
            Step::DocumentUpload => self.record.documents.is_some(),
            Step::CreditValidation => self
                .record
                .credit
                .as_ref()
                .map(|c| c.data.decision == CreditDecision::Approved)
                .unwrap_or(false),
            Step::ServiceSelection => self.record.service.is_some(),
            Step::ContractGeneration => self.record.contract.is_some(),
            Step::DigitalSignature => self.record.signature.is_some(),
            Step::CaseComplete => self.record.closure.is_some(),
        }
    }

    /// Declarative per-step predicate: the current step's own requirements
    /// are met and the flow may move on.
    pub fn can_advance(&self) -> bool {
        self.section_complete(self.step)
    }

    fn prerequisites_met(&self, for_step: Step) -> Result<(), AdvanceError> {
        for earlier in Step::ALL.iter().take_while(|s| **s < for_step) {
            if !self.section_complete(*earlier) {
                return Err(AdvanceError::IncompletePrerequisite(*earlier));
            }
        }
        Ok(())
    }

    fn merge(&mut self, data: StepData) -> StepOutcome {
        let halted = match data {
            StepData::Identity {
                document_type,
                document_number,
                document_photo,
                face_photo,
                identity,
            } => {
                self.record.document_type = Some(document_type);
                self.record.document_number = Some(document_number);
                self.record.document_photo = document_photo;
                self.record.face_photo = face_photo;
                self.record.identity = Some(identity);
                None
            }
            StepData::Enrollment(form) => {
                self.record.enrollment = Some(form);
                None
            }
            StepData::Documents(bundle) => {
                self.record.documents = Some(bundle);
                None
            }
            StepData::Credit(response) => {
                let decision = response.data.decision;
                self.record.credit = Some(response);
                (decision != CreditDecision::Approved).then_some(decision)
            }
            StepData::Service(selection) => {
                self.record.service = Some(selection);
                None
            }
            StepData::Contract(contract) => {
                self.record.contract = Some(contract);
                None
            }
            StepData::Signature(signature) => {
                self.record.signature = Some(signature);
                None
            }
            StepData::Closure(closure) => {
                self.record.closure = Some(closure);
                None
            }
        };

        self.epoch += 1;

        if let Some(decision) = halted {
            tracing::warn!(
                "Wizard halted at '{}' with decision {:?}",
                self.step.name(),
                decision
            );
            return StepOutcome::Halted(decision);
        }

        match self.step.next() {
            Some(next) => {
                tracing::info!("Wizard advanced: '{}' -> '{}'", self.step.name(), next.name());
                self.step = next;
                StepOutcome::Advanced(next)
            }
            None => StepOutcome::Terminal,
        }
    }

    /// Merges `data` into the record and advances.
    ///
    /// Rejected when the data is for another step or an earlier section is
    /// missing; the record is untouched on rejection. A non-approved credit
    /// decision merges but halts.
    pub fn advance(&mut self, data: StepData) -> Result<StepOutcome, AdvanceError> {
        let step = data.step();
        if step != self.step {
            return Err(AdvanceError::WrongStep {
                expected: self.step,
                got: step,
            });
        }
        self.prerequisites_met(step)?;
        Ok(self.merge(data))
    }

    /// Applies a response that was produced under `token`. Responses from a
    /// superseded epoch are dropped without touching the record.
    pub fn apply(&mut self, token: StepToken, data: StepData) -> Applied {
        if token.epoch != self.epoch || token.step != self.step {
            tracing::debug!(
                "Dropping stale step response for '{}' (epoch {})",
                token.step.name(),
                token.epoch
            );
            return Applied::Stale;
        }
        match self.advance(data) {
            Ok(outcome) => Applied::Merged(outcome),
            Err(e) => Applied::Rejected(e),
        }
    }

    /// Steps back one stage, floored at the first step. Already-merged
    /// sections are kept; nothing is rolled back.
    pub fn retreat(&mut self) {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
            self.epoch += 1;
        }
    }

    /// Returns to the first step with an empty record.
    pub fn reset(&mut self) {
        tracing::info!("Wizard reset from '{}'", self.step.name());
        *self = Self {
            epoch: self.epoch + 1,
            ..Self::new()
        };
    }
}
