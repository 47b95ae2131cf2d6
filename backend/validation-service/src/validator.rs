//! The validation stage's business rules. Intentionally trivial — the rules
//! exist to exercise the accept/reject branch of the pipeline, not to be a
//! real document-format validator.

const MAX_NAME_LENGTH: usize = 30;
const EXPECTED_CONTENT_TYPE: &str = "application/pdf";
const EXPECTED_EXTENSION: &str = ".pdf";

/// Checks, in order: name non-blank, name length bound, content type,
/// extension-matches-content-type. Returns the reason for the first rule
/// that fails.
pub fn validate(name: &str, content_type: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("document name must not be blank".to_string());
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "document name length {} exceeds the {}-character bound",
            name.len(),
            MAX_NAME_LENGTH
        ));
    }

    if content_type != EXPECTED_CONTENT_TYPE {
        return Err(format!(
            "content type {content_type} is not the expected {EXPECTED_CONTENT_TYPE}"
        ));
    }

    if !name.to_lowercase().ends_with(EXPECTED_EXTENSION) {
        return Err(format!(
            "document name {name} does not have the expected {EXPECTED_EXTENSION} extension"
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_pdf_upload() {
        assert!(validate("report.pdf", "application/pdf").is_ok());
    }

    #[test]
    fn rejects_blank_name() {
        let err = validate("   ", "application/pdf").unwrap_err();
        assert!(err.contains("blank"));
    }

    #[test]
    fn rejects_name_over_thirty_characters() {
        let long_name = "a".repeat(27) + ".pdf"; // 31 chars
        let err = validate(&long_name, "application/pdf").unwrap_err();
        assert!(err.contains("30-character bound"));
    }

    #[test]
    fn rejects_non_pdf_content_type() {
        let err = validate("report.docx", "application/msword").unwrap_err();
        assert!(err.contains("content type"));
    }

    #[test]
    fn rejects_mismatched_extension() {
        let err = validate("report.docx", "application/pdf").unwrap_err();
        assert!(err.contains("extension"));
    }

    #[test]
    fn boundary_name_length_of_exactly_thirty_is_accepted() {
        let name = "a".repeat(26) + ".pdf"; // 30 chars
        assert_eq!(name.len(), 30);
        assert!(validate(&name, "application/pdf").is_ok());
    }
}
