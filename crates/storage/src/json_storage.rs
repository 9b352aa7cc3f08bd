//! JSON file storage implementation.
//!
//! Stores each record as a pretty-printed JSON file under `<root>/<kind>/` and
//! keeps a small per-object meta marker (version + updated_at) under
//! `<root>/meta/<kind>/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use academia_core::{
    Block, BlockId, Cohort, CohortId, Enrollment, EnrollmentFilter, Exam, ExamFilter, ExamId,
    Grade, GradeFilter, GradeId, Module, ModuleId, Program, ProgramId, Student, StudentId,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};
use super::{Result, Storage};

const KINDS: [&str; 8] = [
    "programs",
    "blocks",
    "modules",
    "exams",
    "grades",
    "enrollments",
    "cohorts",
    "students",
];

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the data and meta
    /// directories if they are missing.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in KINDS {
            fs::create_dir_all(root.join(kind)).await?;
            fs::create_dir_all(root.join("meta").join(kind)).await?;
        }

        debug!("Opened JSON storage at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join(kind).join(format!("{}.json", id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Current stored version of an object, 0 if never written.
    pub async fn version(&self, kind: &str, id: &str) -> Result<u64> {
        match fs::read_to_string(self.meta_path(kind, id)).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("version").and_then(|v| v.as_u64()).unwrap_or(0))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let version = self.version(kind, id).await? + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(self.meta_path(kind, id), serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn write_object<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.object_path(kind, id), json.as_bytes()).await?;
        let version = self.bump_version(kind, id).await?;
        debug!("Wrote {}/{} (v{})", kind, id, version);
        Ok(())
    }

    async fn remove_object(&self, kind: &str, id: &str) -> Result<()> {
        for path in [self.object_path(kind, id), self.meta_path(kind, id)] {
            fs::remove_file(path).await.or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
            })?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_program(&mut self, program: &Program) -> Result<()> {
        self.write_object("programs", &program.id.to_string(), program).await
    }

    async fn load_program(&self, id: ProgramId) -> Result<Option<Program>> {
        read_json(&self.object_path("programs", &id.to_string())).await
    }

    async fn list_programs(&self) -> Result<Vec<Program>> {
        let mut programs: Vec<Program> = list_dir(&self.root.join("programs")).await?;
        programs.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(programs)
    }

    async fn save_block(&mut self, block: &Block) -> Result<()> {
        self.write_object("blocks", &block.id.to_string(), block).await
    }

    async fn load_block(&self, id: BlockId) -> Result<Option<Block>> {
        read_json(&self.object_path("blocks", &id.to_string())).await
    }

    async fn list_blocks(&self, program_id: ProgramId) -> Result<Vec<Block>> {
        let all = list_dir(&self.root.join("blocks")).await?;
        Ok(all.into_iter()
            .filter(|b: &Block| b.program_id == program_id)
            .collect())
    }

    async fn save_module(&mut self, module: &Module) -> Result<()> {
        self.write_object("modules", &module.id.to_string(), module).await
    }

    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>> {
        read_json(&self.object_path("modules", &id.to_string())).await
    }

    async fn list_modules(&self, block_id: BlockId) -> Result<Vec<Module>> {
        let all = list_dir(&self.root.join("modules")).await?;
        Ok(all.into_iter()
            .filter(|m: &Module| m.block_id == block_id)
            .collect())
    }

    async fn save_exam(&mut self, exam: &Exam) -> Result<()> {
        exam.validate()?;
        self.write_object("exams", &exam.id.to_string(), exam).await
    }

    async fn load_exam(&self, id: ExamId) -> Result<Option<Exam>> {
        let exam: Option<Exam> = read_json(&self.object_path("exams", &id.to_string())).await?;
        if let Some(exam) = &exam {
            exam.validate()?;
        }
        Ok(exam)
    }

    async fn list_exams(&self, filter: &ExamFilter) -> Result<Vec<Exam>> {
        let all: Vec<Exam> = list_dir(&self.root.join("exams")).await?;
        let mut exams = Vec::new();
        for exam in all.into_iter().filter(|e| filter.matches(e)) {
            exam.validate()?;
            exams.push(exam);
        }
        Ok(exams)
    }

    async fn save_grade(&mut self, grade: &Grade) -> Result<()> {
        self.write_object("grades", &grade.id.to_string(), grade).await
    }

    async fn load_grade(&self, id: GradeId) -> Result<Option<Grade>> {
        read_json(&self.object_path("grades", &id.to_string())).await
    }

    async fn list_grades(&self, student_id: StudentId, filter: &GradeFilter) -> Result<Vec<Grade>> {
        let all: Vec<Grade> = list_dir(&self.root.join("grades")).await?;
        let mut owners: HashMap<ExamId, Option<ModuleId>> = HashMap::new();
        let mut grades = Vec::new();

        for grade in all {
            if grade.student_id != student_id {
                continue;
            }
            if filter.exam_id.is_some_and(|id| grade.exam_id != id) {
                continue;
            }
            if filter.approved.is_some_and(|approved| grade.approved != approved) {
                continue;
            }
            if let Some(module_id) = filter.module_id {
                let owner = match owners.get(&grade.exam_id) {
                    Some(owner) => *owner,
                    None => {
                        // Dangling grades never match a module filter; callers
                        // without one still see them.
                        let owner = self
                            .load_exam(grade.exam_id)
                            .await?
                            .and_then(|exam| exam.owner.module_id());
                        owners.insert(grade.exam_id, owner);
                        owner
                    }
                };
                if owner != Some(module_id) {
                    continue;
                }
            }
            grades.push(grade);
        }

        Ok(grades)
    }

    async fn delete_grade(&mut self, id: GradeId) -> Result<Option<Grade>> {
        let existing = self.load_grade(id).await?;
        if existing.is_some() {
            self.remove_object("grades", &id.to_string()).await?;
        }
        Ok(existing)
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.write_object("enrollments", &enrollment.id.to_string(), enrollment).await
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>> {
        let all = list_dir(&self.root.join("enrollments")).await?;
        Ok(all.into_iter()
            .filter(|e: &Enrollment| filter.matches(e))
            .collect())
    }

    async fn save_cohort(&mut self, cohort: &Cohort) -> Result<()> {
        self.write_object("cohorts", &cohort.id.to_string(), cohort).await
    }

    async fn load_cohort(&self, id: CohortId) -> Result<Option<Cohort>> {
        read_json(&self.object_path("cohorts", &id.to_string())).await
    }

    async fn save_student(&mut self, student: &Student) -> Result<()> {
        self.write_object("students", &student.id.to_string(), student).await
    }

    async fn load_student(&self, id: StudentId) -> Result<Option<Student>> {
        read_json(&self.object_path("students", &id.to_string())).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&path).await {
            Ok(Some(item)) => items.push(item),
            // Removed between read_dir and read
            Ok(None) => {}
            Err(e) => {
                warn!("Unreadable record {}: {}", path.display(), e);
                return Err(e);
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use academia_core::{ExamOwner, ExamTier, PASSING_SCORE};
    use tempfile::TempDir;

    async fn storage() -> (TempDir, JsonStorage) {
        let dir = TempDir::new().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_program_round_trip() {
        let (_dir, mut storage) = storage().await;
        let program = Program::new("DEVJR", "Dev Jr");

        storage.save_program(&program).await.unwrap();
        let loaded = storage.load_program(program.id).await.unwrap().unwrap();

        assert_eq!(loaded.code, "DEVJR");
        assert!(storage.load_program(ProgramId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_blocks_and_modules_by_parent() {
        let (_dir, mut storage) = storage().await;
        let program = Program::new("DEVJR", "Dev Jr");
        let block = Block::new(program.id, "Fundamentos", 1);
        let stray = Block::new(ProgramId::new(), "Otro", 1);
        let module = Module::new(block.id, "HTML", 1);

        storage.save_block(&block).await.unwrap();
        storage.save_block(&stray).await.unwrap();
        storage.save_module(&module).await.unwrap();

        let blocks = storage.list_blocks(program.id).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "Fundamentos");

        let modules = storage.list_modules(block.id).await.unwrap();
        assert_eq!(modules.len(), 1);
        assert!(storage.list_modules(stray.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_grades_filters_by_module() {
        let (_dir, mut storage) = storage().await;
        let student = StudentId::new();
        let m1 = ModuleId::new();
        let m2 = ModuleId::new();
        let e1 = Exam::new(ExamOwner::Module(m1), ExamTier::Parcial).unwrap();
        let e2 = Exam::new(ExamOwner::Module(m2), ExamTier::Parcial).unwrap();
        storage.save_exam(&e1).await.unwrap();
        storage.save_exam(&e2).await.unwrap();

        storage.save_grade(&Grade::new(student, e1.id, 8.0, PASSING_SCORE)).await.unwrap();
        storage.save_grade(&Grade::new(student, e2.id, 4.0, PASSING_SCORE)).await.unwrap();
        storage.save_grade(&Grade::new(StudentId::new(), e1.id, 9.0, PASSING_SCORE)).await.unwrap();

        let all = storage.list_grades(student, &GradeFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let m1_grades = storage
            .list_grades(student, &GradeFilter { module_id: Some(m1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(m1_grades.len(), 1);
        assert_eq!(m1_grades[0].exam_id, e1.id);

        let approved = storage.list_grades(student, &GradeFilter::approved()).await.unwrap();
        assert_eq!(approved.len(), 1);
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_delete_clears_it() {
        let (_dir, mut storage) = storage().await;
        let mut grade = Grade::new(StudentId::new(), ExamId::new(), 5.0, PASSING_SCORE);
        let id = grade.id.to_string();

        storage.save_grade(&grade).await.unwrap();
        grade.score = 7.0;
        grade.approved = true;
        storage.save_grade(&grade).await.unwrap();
        assert_eq!(storage.version("grades", &id).await.unwrap(), 2);

        let deleted = storage.delete_grade(grade.id).await.unwrap().unwrap();
        assert_eq!(deleted.score, 7.0);
        assert_eq!(storage.version("grades", &id).await.unwrap(), 0);
        assert!(storage.delete_grade(grade.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let (dir, storage) = storage().await;
        std::fs::write(dir.path().join("programs").join("broken.json"), b"{ not json").unwrap();

        let err = storage.list_programs().await.unwrap_err();
        assert!(matches!(err, crate::StorageError::Json(_)));
    }

    #[tokio::test]
    async fn test_invalid_stored_exam_is_a_model_error() {
        let (dir, storage) = storage().await;
        let mut exam = Exam::new(ExamOwner::Module(ModuleId::new()), ExamTier::Parcial).unwrap();
        exam.tier = ExamTier::FinalSinc;
        let path = dir.path().join("exams").join(format!("{}.json", exam.id));
        std::fs::write(path, serde_json::to_string(&exam).unwrap()).unwrap();

        let err = storage.load_exam(exam.id).await.unwrap_err();
        assert!(matches!(err, crate::StorageError::Model(_)));
        assert!(storage.load_exam(ExamId::new()).await.unwrap().is_none());
    }
}
