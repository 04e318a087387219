//! Document validation seam.
//!
//! The service never interprets model documents. Before an import or update
//! is stored, the document is handed to a [`ModelValidator`], which stands in
//! for the model parser and consistency checks.

/// Checks a plaintext model document before it is stored.
pub trait ModelValidator: Send + Sync {
    /// Accept the document, or explain why it is rejected.
    fn validate(&self, document: &str) -> Result<(), String>;
}

/// Validator that accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ModelValidator for AcceptAll {
    fn validate(&self, _document: &str) -> Result<(), String> {
        Ok(())
    }
}

impl<F> ModelValidator for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, document: &str) -> Result<(), String> {
        self(document)
    }
}
