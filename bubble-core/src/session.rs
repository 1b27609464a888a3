use bubble_types::PdfId;

/// Per-request session state handed to the orchestrator.
///
/// Carries what the browser kept as ambient component state: who is talking,
/// which chat is open, and which document namespace (if any) is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub chat_id: String,
    /// When set, replies are generated in retrieval-augmented mode.
    pub namespace: Option<PdfId>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<PdfId>) -> Self {
        self.namespace = namespace;
        self
    }
}
