//! Student and instructor credential lookup.
//!
//! Both directories are whitespace-separated text files read once at startup:
//! students as `name roll reg_no password`, instructors as
//! `name instructor_id password`.

use log::{info, warn};
use shared::StudentProfile;
use std::io::ErrorKind;
use std::path::Path;

/// Credential lookup used by session handlers and the instructor console
pub trait CredentialStore: Send + Sync {
    fn verify_student(&self, roll: &str, password: &str) -> Option<StudentProfile>;

    /// Returns the instructor's display name on success
    fn verify_instructor(&self, instructor_id: &str, password: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
struct StudentEntry {
    name: String,
    roll: String,
    reg_no: String,
    password: String,
}

#[derive(Debug, Clone)]
struct InstructorEntry {
    name: String,
    instructor_id: String,
    password: String,
}

#[derive(Debug, Default)]
pub struct Directory {
    students: Vec<StudentEntry>,
    instructors: Vec<InstructorEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both directory files. A missing file yields an empty directory
    /// so every login against it fails.
    pub fn load(students: &Path, instructors: &Path) -> std::io::Result<Self> {
        let mut directory = Self::new();

        if let Some(text) = read_optional(students)? {
            directory.parse_students(&text);
        }
        if let Some(text) = read_optional(instructors)? {
            directory.parse_instructors(&text);
        }

        info!(
            "Loaded {} students and {} instructors",
            directory.students.len(),
            directory.instructors.len()
        );
        Ok(directory)
    }

    /// Adds students from whitespace-separated `name roll reg_no password`
    /// records. A trailing partial record is ignored.
    pub fn parse_students(&mut self, text: &str) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for record in tokens.chunks_exact(4) {
            self.students.push(StudentEntry {
                name: record[0].to_string(),
                roll: record[1].to_string(),
                reg_no: record[2].to_string(),
                password: record[3].to_string(),
            });
        }
    }

    /// Same as `parse_students` for `name id password` records.
    pub fn parse_instructors(&mut self, text: &str) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for record in tokens.chunks_exact(3) {
            self.instructors.push(InstructorEntry {
                name: record[0].to_string(),
                instructor_id: record[1].to_string(),
                password: record[2].to_string(),
            });
        }
    }

    pub fn with_student(mut self, name: &str, roll: &str, reg_no: &str, password: &str) -> Self {
        self.students.push(StudentEntry {
            name: name.to_string(),
            roll: roll.to_string(),
            reg_no: reg_no.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn with_instructor(mut self, name: &str, instructor_id: &str, password: &str) -> Self {
        self.instructors.push(InstructorEntry {
            name: name.to_string(),
            instructor_id: instructor_id.to_string(),
            password: password.to_string(),
        });
        self
    }
}

impl CredentialStore for Directory {
    fn verify_student(&self, roll: &str, password: &str) -> Option<StudentProfile> {
        self.students
            .iter()
            .find(|s| s.roll == roll && s.password == password)
            .map(|s| StudentProfile {
                name: s.name.clone(),
                reg_no: s.reg_no.clone(),
            })
    }

    fn verify_instructor(&self, instructor_id: &str, password: &str) -> Option<String> {
        self.instructors
            .iter()
            .find(|i| i.instructor_id == instructor_id && i.password == password)
            .map(|i| i.name.clone())
    }
}

fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Credential file {} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
