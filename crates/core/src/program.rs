//! Program structure model - programs, blocks and modules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::{ModelError, Result};
use crate::id::{BlockId, ModuleId, ProgramId};
use crate::Time;

/// A full training course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Unique identifier
    pub id: ProgramId,

    /// Short unique code, e.g. "DEVJR"
    pub code: String,

    /// Display name
    pub name: String,

    /// Whether new cohorts may be opened
    pub active: bool,

    /// When created
    pub created_at: Time,
}

impl Program {
    /// Create a new active program.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProgramId::new(),
            code: code.into(),
            name: name.into(),
            active: true,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A curriculum sub-division of a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier
    pub id: BlockId,

    /// Owning program
    pub program_id: ProgramId,

    /// Display name, unique within the program
    pub name: String,

    /// Position within the program
    pub order: u32,
}

impl Block {
    /// Create a new block.
    pub fn new(program_id: ProgramId, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: BlockId::new(),
            program_id,
            name: name.into(),
            order,
        }
    }
}

/// Default attendance required to pass a practical module.
pub const DEFAULT_PRACTICAL_ATTENDANCE_PCT: u8 = 80;

/// A gradable unit within a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Unique identifier
    pub id: ModuleId,

    /// Owning block
    pub block_id: BlockId,

    /// Display name, unique within the block
    pub name: String,

    /// Position within the block, starting at 1
    pub order: u32,

    /// Practical modules are graded on attendance as well
    #[serde(default)]
    pub is_practical: bool,

    /// Attendance percentage required when practical
    #[serde(default = "default_attendance_pct")]
    pub required_practical_attendance_pct: u8,

    /// First class day
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last class day
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_attendance_pct() -> u8 {
    DEFAULT_PRACTICAL_ATTENDANCE_PCT
}

impl Module {
    /// Create a new theoretical module.
    pub fn new(block_id: BlockId, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: ModuleId::new(),
            block_id,
            name: name.into(),
            order,
            is_practical: false,
            required_practical_attendance_pct: DEFAULT_PRACTICAL_ATTENDANCE_PCT,
            start_date: None,
            end_date: None,
        }
    }

    /// Set the class period, rejecting inverted ranges.
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ModelError::InvertedDates { start, end });
        }
        self.start_date = Some(start);
        self.end_date = Some(end);
        Ok(self)
    }

    /// Mark the module as practical with the given attendance requirement.
    pub fn practical(mut self, required_attendance_pct: u8) -> Self {
        self.is_practical = true;
        self.required_practical_attendance_pct = required_attendance_pct.min(100);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_defaults() {
        let module = Module::new(BlockId::new(), "Git", 1);
        assert!(!module.is_practical);
        assert_eq!(module.required_practical_attendance_pct, 80);
        assert!(module.start_date.is_none());
    }

    #[test]
    fn test_module_rejects_inverted_dates() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let err = Module::new(BlockId::new(), "Git", 1).with_dates(start, end).unwrap_err();
        assert!(matches!(err, ModelError::InvertedDates { .. }));
    }

    #[test]
    fn test_practical_caps_percentage() {
        let module = Module::new(BlockId::new(), "Taller", 2).practical(120);
        assert!(module.is_practical);
        assert_eq!(module.required_practical_attendance_pct, 100);
    }

    #[test]
    fn test_module_deserializes_with_missing_optional_fields() {
        let block_id = BlockId::new();
        let json = serde_json::json!({
            "id": ModuleId::new(),
            "block_id": block_id,
            "name": "HTML",
            "order": 1,
        });
        let module: Module = serde_json::from_value(json).unwrap();
        assert_eq!(module.block_id, block_id);
        assert_eq!(module.required_practical_attendance_pct, 80);
    }
}
