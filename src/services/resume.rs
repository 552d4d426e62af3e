//! Resume text extraction and review prompt

use tracing::debug;

use crate::types::{AiverseError, Result};

/// Minimum extracted characters for a resume to count as readable
pub const MIN_RESUME_TEXT_CHARS: usize = 50;

const UNREADABLE: &str =
    "Could not extract readable text. Please upload a text-based (non-scanned) PDF resume.";

/// Extract the text layer of a PDF.
///
/// Parsing runs on the blocking pool; a parser panic on a malformed file is
/// reported as unreadable input.
pub async fn extract_text(pdf: Vec<u8>) -> Result<String> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
        .await
        .map_err(|e| {
            debug!("PDF parser aborted: {}", e);
            AiverseError::Validation(UNREADABLE.into())
        })?;

    let text = extracted.map_err(|e| {
        debug!("PDF text extraction failed: {}", e);
        AiverseError::Validation(UNREADABLE.into())
    })?;

    ensure_readable(text)
}

/// Reject text too short to review
pub fn ensure_readable(text: String) -> Result<String> {
    if text.trim().chars().count() < MIN_RESUME_TEXT_CHARS {
        return Err(AiverseError::Validation(UNREADABLE.into()));
    }
    Ok(text)
}

/// Review prompt sent to the text model
pub fn review_prompt(resume_text: &str) -> String {
    format!(
        "You are an expert career advisor. Review this resume and provide a detailed analysis including:\n\
         1. Strengths\n\
         2. Weaknesses\n\
         3. Areas of improvement\n\
         4. Suggestions to make it more ATS-friendly.\n\
         \n\
         Resume Content:\n\
         {}\n",
        resume_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_unreadable() {
        let err = ensure_readable("   John Doe   ".into()).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("non-scanned"));

        let long = "Experienced engineer with ten years of distributed systems work.".to_string();
        assert!(ensure_readable(long).is_ok());
    }

    #[test]
    fn test_prompt_embeds_resume() {
        let prompt = review_prompt("  Jane Roe, Rust engineer  ");
        assert!(prompt.starts_with("You are an expert career advisor."));
        assert!(prompt.contains("4. Suggestions to make it more ATS-friendly."));
        assert!(prompt.ends_with("Resume Content:\nJane Roe, Rust engineer\n"));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_unreadable() {
        let err = extract_text(b"definitely not a pdf".to_vec()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
