use std::path::Path;

use uuid::Uuid;

use crate::errors::AppError;

/// Accepted resume formats and their content types.
const ALLOWED_EXTENSIONS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeFormat {
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Checks the file name and size of an uploaded resume.
pub fn validate_resume(
    file_name: &str,
    size: usize,
    max_size: usize,
) -> Result<ResumeFormat, AppError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let (extension, content_type) = ALLOWED_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .copied()
        .ok_or_else(|| AppError::Validation("Please upload document files.".to_string()))?;

    if size == 0 {
        return Err(AppError::Validation("Please upload file.".to_string()));
    }
    if size > max_size {
        return Err(AppError::Validation(format!(
            "Please upload file less than {}.",
            display_size(max_size)
        )));
    }

    Ok(ResumeFormat {
        extension,
        content_type,
    })
}

fn display_size(bytes: usize) -> String {
    match bytes {
        b if b >= 1_000_000 && b % 1_000_000 == 0 => format!("{}MB", b / 1_000_000),
        b if b >= 1_000 && b % 1_000 == 0 => format!("{}KB", b / 1_000),
        b => format!("{b} bytes"),
    }
}

/// `<applicant name, non-alphanumerics as underscores>_<job id>_<applicant id>.<ext>`
///
/// The applicant id keeps keys unique per application, so namesakes never
/// share an object.
pub fn resume_object_name(
    applicant_name: &str,
    job_id: Uuid,
    applicant_id: Uuid,
    format: ResumeFormat,
) -> String {
    let name: String = applicant_name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{name}_{job_id}_{applicant_id}.{}", format.extension)
}
