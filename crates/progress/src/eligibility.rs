//! Eligibility filtering - which exams a student may sit right now.
//!
//! Decision rules, in precedence order:
//!
//! 1. A selected module offers its PARCIAL and RECUP exams, minus PARCIAL once
//!    it has been passed. RECUP stays open regardless of PARCIAL.
//! 2. With no module selected the request is for the block's finals. A block
//!    with a single module offers that module's exams as its finals; any other
//!    block offers FINAL_VIRTUAL, FINAL_SINC and EQUIVALENCIA only after every
//!    module is approved.
//! 3. Module exams are only reachable through an active enrollment in the
//!    module. Approved modules are listed but not selectable.
//! 4. Once every module of a multi-module block is approved, module selection
//!    closes and only the finals remain. A single-module block stays open, its
//!    module exams being its finals.

use std::collections::BTreeSet;
use academia_core::{BlockId, Enrollment, EnrollmentState, Exam, ExamTier, ModuleId};
use serde::Serialize;
use crate::approval::{ApprovalState, DuplicateApproval};
use crate::config::ProgressionConfig;
use crate::error::{ProgressionError, Result};
use crate::structure::{BlockNode, ModuleNode, ProgramStructure};

/// What the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityQuery {
    /// Selected block
    pub block_id: BlockId,
    /// Selected module, or `None` to ask for the block's finals
    pub module_id: Option<ModuleId>,
}

impl EligibilityQuery {
    /// Ask for a block's finals.
    pub fn finals(block_id: BlockId) -> Self {
        Self { block_id, module_id: None }
    }

    /// Ask for a module's exams.
    pub fn module(block_id: BlockId, module_id: ModuleId) -> Self {
        Self { block_id, module_id: Some(module_id) }
    }
}

/// Where a student stands on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    /// Approved; shown as "Aprobado"
    Approved,
    /// Holds an enrollment referencing the module
    Enrolled,
    /// No enrollment for the module
    NotEnrolled,
}

/// A module as shown in a selection list.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleOption {
    /// Module
    pub module_id: ModuleId,
    /// Display name
    pub name: String,
    /// Position in the block
    pub order: u32,
    /// Student's standing
    pub status: ModuleStatus,
    /// Whether the module can be picked
    pub selectable: bool,
}

/// An exam the student may sit.
#[derive(Debug, Clone, Serialize)]
pub struct OfferableExam {
    /// The exam
    pub exam: Exam,
    /// An approved grade already exists; a second one must not be recorded
    pub already_approved_exists: bool,
}

/// Result of an eligibility query.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityReport {
    /// Offerable exams, ordered by tier then date
    pub exams: Vec<OfferableExam>,
    /// Modules of the block with their standing
    pub modules: Vec<ModuleOption>,
    /// False once every module of a multi-module block is approved
    pub module_selection_open: bool,
    /// The block's only module stands in for its finals
    pub finals_promoted: bool,
    /// Duplicate approvals on listed exams
    pub warnings: Vec<DuplicateApproval>,
}

impl EligibilityReport {
    /// Tiers of the offered exams, in order.
    pub fn tiers(&self) -> Vec<ExamTier> {
        self.exams.iter().map(|e| e.exam.tier).collect()
    }
}

/// A module on the enrollment screen.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOption {
    /// Module
    pub module_id: ModuleId,
    /// Display name
    pub name: String,
    /// Student's standing
    pub status: ModuleStatus,
    /// A new enrollment may be requested
    pub can_enroll: bool,
}

/// A block on the enrollment screen.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEnrollmentOptions {
    /// Block
    pub block_id: BlockId,
    /// Display name
    pub name: String,
    /// Modules in order
    pub modules: Vec<EnrollmentOption>,
}

/// Computes offerable exams.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    config: ProgressionConfig,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(&ProgressionConfig::default())
    }
}

impl EligibilityFilter {
    /// Create a filter using the configured active enrollment states.
    pub fn new(config: &ProgressionConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Evaluate a query for the student of `approval`.
    pub fn evaluate(
        &self,
        structure: &ProgramStructure,
        approval: &ApprovalState,
        enrollments: &[Enrollment],
        query: &EligibilityQuery,
    ) -> Result<EligibilityReport> {
        let block = structure
            .block(query.block_id)
            .ok_or_else(|| ProgressionError::not_found("block", query.block_id))?;

        let selected = match query.module_id {
            Some(module_id) => Some(selected_module(structure, block, module_id)?),
            None => None,
        };

        let enrolled = self.enrolled_modules(approval, enrollments, |e| {
            self.config.is_active(e.state)
        })?;
        let all_approved = block.is_gradable()
            && block.module_ids().all(|m| approval.is_module_approved(m));
        let module_selection_open = !all_approved || block.is_single_module();

        let modules = block
            .modules
            .iter()
            .map(|node| {
                let status = module_status(node.module.id, approval, &enrolled);
                ModuleOption {
                    module_id: node.module.id,
                    name: node.module.name.clone(),
                    order: node.module.order,
                    status,
                    selectable: module_selection_open && status == ModuleStatus::Enrolled,
                }
            })
            .collect();

        let mut finals_promoted = false;
        let exams: Vec<&Exam> = match selected {
            Some(node) if module_selection_open => module_exams(node, approval, &enrolled),
            Some(_) => Vec::new(),
            None if block.is_single_module() => {
                finals_promoted = true;
                module_exams(&block.modules[0], approval, &enrolled)
            }
            None if all_approved => block.exams.iter().collect(),
            None => Vec::new(),
        };

        let warnings = exams
            .iter()
            .filter_map(|e| approval.duplicate_for(e.id).cloned())
            .collect();
        let exams = exams
            .into_iter()
            .map(|exam| OfferableExam {
                exam: exam.clone(),
                already_approved_exists: approval.has_approved_exam(exam.id),
            })
            .collect();

        Ok(EligibilityReport {
            exams,
            modules,
            module_selection_open,
            finals_promoted,
            warnings,
        })
    }

    /// Every module of the program with the student's standing, for the
    /// enrollment screen. Any enrollment that is not dropped or graduated
    /// counts as holding the module.
    pub fn enrollment_options(
        &self,
        structure: &ProgramStructure,
        approval: &ApprovalState,
        enrollments: &[Enrollment],
    ) -> Result<Vec<BlockEnrollmentOptions>> {
        let held = self.enrolled_modules(approval, enrollments, |e| {
            !matches!(e.state, EnrollmentState::Baja | EnrollmentState::Egresado)
        })?;

        Ok(structure
            .blocks()
            .iter()
            .map(|block| BlockEnrollmentOptions {
                block_id: block.block.id,
                name: block.block.name.clone(),
                modules: block
                    .modules
                    .iter()
                    .map(|node| {
                        let status = module_status(node.module.id, approval, &held);
                        EnrollmentOption {
                            module_id: node.module.id,
                            name: node.module.name.clone(),
                            status,
                            can_enroll: status == ModuleStatus::NotEnrolled,
                        }
                    })
                    .collect(),
            })
            .collect())
    }

    fn enrolled_modules(
        &self,
        approval: &ApprovalState,
        enrollments: &[Enrollment],
        counts: impl Fn(&Enrollment) -> bool,
    ) -> Result<BTreeSet<ModuleId>> {
        let mut modules = BTreeSet::new();
        for enrollment in enrollments {
            if enrollment.student_id != approval.student_id {
                return Err(ProgressionError::InvalidArgument(format!(
                    "enrollment {} belongs to student {}, not {}",
                    enrollment.id, enrollment.student_id, approval.student_id
                )));
            }
            if let Some(module_id) = enrollment.module_id {
                if counts(enrollment) {
                    modules.insert(module_id);
                }
            }
        }
        Ok(modules)
    }
}

fn selected_module<'a>(
    structure: &'a ProgramStructure,
    block: &BlockNode,
    module_id: ModuleId,
) -> Result<&'a ModuleNode> {
    let node = structure
        .module(module_id)
        .ok_or_else(|| ProgressionError::not_found("module", module_id))?;
    if node.module.block_id != block.block.id {
        return Err(ProgressionError::InvalidArgument(format!(
            "module '{}' is not part of block '{}'",
            node.module.name, block.block.name
        )));
    }
    Ok(node)
}

fn module_status(id: ModuleId, approval: &ApprovalState, enrolled: &BTreeSet<ModuleId>) -> ModuleStatus {
    if approval.is_module_approved(id) {
        ModuleStatus::Approved
    } else if enrolled.contains(&id) {
        ModuleStatus::Enrolled
    } else {
        ModuleStatus::NotEnrolled
    }
}

fn module_exams<'a>(
    node: &'a ModuleNode,
    approval: &ApprovalState,
    enrolled: &BTreeSet<ModuleId>,
) -> Vec<&'a Exam> {
    if !enrolled.contains(&node.module.id) {
        return Vec::new();
    }
    let parcial_passed = approval.has_module_tier(node.module.id, ExamTier::Parcial);
    node.exams
        .iter()
        .filter(|e| e.tier.is_module_tier())
        .filter(|e| !(parcial_passed && e.tier == ExamTier::Parcial))
        .collect()
}
