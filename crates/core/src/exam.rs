//! Exam model - gradable events owned by a module or a block.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::{ModelError, Result};
use crate::id::{BlockId, ExamId, ModuleId};

/// Exam category.
///
/// Ordering follows the progression a student goes through, which is also
/// the order exams are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamTier {
    /// Partial exam of a module
    Parcial,
    /// Remedial exam of a module
    Recup,
    /// Asynchronous final of a block
    FinalVirtual,
    /// Synchronous final of a block
    FinalSinc,
    /// Equivalency or waiver of a block
    Equivalencia,
}

impl ExamTier {
    /// All tiers, in progression order.
    pub const ALL: [ExamTier; 5] = [
        ExamTier::Parcial,
        ExamTier::Recup,
        ExamTier::FinalVirtual,
        ExamTier::FinalSinc,
        ExamTier::Equivalencia,
    ];

    /// Tiers a module may own.
    pub fn is_module_tier(self) -> bool {
        matches!(self, ExamTier::Parcial | ExamTier::Recup)
    }

    /// Tiers a block may own.
    pub fn is_block_tier(self) -> bool {
        !self.is_module_tier()
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamTier::Parcial => "PARCIAL",
            ExamTier::Recup => "RECUP",
            ExamTier::FinalVirtual => "FINAL_VIRTUAL",
            ExamTier::FinalSinc => "FINAL_SINC",
            ExamTier::Equivalencia => "EQUIVALENCIA",
        }
    }
}

impl std::fmt::Display for ExamTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExamTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ExamTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown exam tier: {}", s))
    }
}

/// What an exam belongs to. Exactly one of a module or a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ExamOwner {
    /// Module-level exam (PARCIAL, RECUP)
    Module(ModuleId),
    /// Block-level exam (FINAL_VIRTUAL, FINAL_SINC, EQUIVALENCIA)
    Block(BlockId),
}

impl ExamOwner {
    /// Owning module, if any.
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            ExamOwner::Module(id) => Some(*id),
            ExamOwner::Block(_) => None,
        }
    }

    /// Owning block, if any.
    pub fn block_id(&self) -> Option<BlockId> {
        match self {
            ExamOwner::Block(id) => Some(*id),
            ExamOwner::Module(_) => None,
        }
    }
}

/// A gradable event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    /// Unique identifier
    pub id: ExamId,

    /// Module or block this exam belongs to
    pub owner: ExamOwner,

    /// Exam category
    pub tier: ExamTier,

    /// Scheduled date
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Weight in the final mark
    #[serde(default)]
    pub weight: f32,
}

impl Exam {
    /// Create an exam, checking that the tier is valid for the owner.
    pub fn new(owner: ExamOwner, tier: ExamTier) -> Result<Self> {
        let exam = Self {
            id: ExamId::new(),
            owner,
            tier,
            date: None,
            weight: 0.0,
        };
        exam.validate()?;
        Ok(exam)
    }

    /// Set the scheduled date.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Check the owner/tier invariant. Records read back from storage
    /// go through this as well.
    pub fn validate(&self) -> Result<()> {
        match self.owner {
            ExamOwner::Module(_) if !self.tier.is_module_tier() => {
                Err(ModelError::TierOwnerMismatch { tier: self.tier, owner: "module" })
            }
            ExamOwner::Block(_) if !self.tier.is_block_tier() => {
                Err(ModelError::TierOwnerMismatch { tier: self.tier, owner: "block" })
            }
            _ => Ok(()),
        }
    }
}

/// Filter for querying exams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamFilter {
    /// Only exams of this module
    pub module_id: Option<ModuleId>,

    /// Only exams of this block
    pub block_id: Option<BlockId>,

    /// Only exams of this tier
    pub tier: Option<ExamTier>,
}

impl ExamFilter {
    /// Filter for a module's exams.
    pub fn for_module(module_id: ModuleId) -> Self {
        Self { module_id: Some(module_id), ..Default::default() }
    }

    /// Filter for a block's own exams.
    pub fn for_block(block_id: BlockId) -> Self {
        Self { block_id: Some(block_id), ..Default::default() }
    }

    /// Whether an exam passes this filter.
    pub fn matches(&self, exam: &Exam) -> bool {
        if let Some(module_id) = self.module_id {
            if exam.owner.module_id() != Some(module_id) {
                return false;
            }
        }
        if let Some(block_id) = self.block_id {
            if exam.owner.block_id() != Some(block_id) {
                return false;
            }
        }
        self.tier.map_or(true, |tier| exam.tier == tier)
    }
}
