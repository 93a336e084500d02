use facet::Facet;

/// Errors that can occur while comparing two documents.
///
/// None of these escape [`crate::Comparator::compare`]: the comparator reports
/// them in the outcome and falls back to the original inputs.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum DiffError {
    /// no body element found in document
    NoBody,

    /// word diff does not reconstruct the {side} text
    Reconstruction { side: String },

    /// cannot splice markers into the tree: {reason}
    Splice { reason: String },

    /// node at {path} no longer resolves
    UnresolvableNode { path: String },

    /// comparison panicked: {message}
    Panicked { message: String },
}
