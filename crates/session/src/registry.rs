use snafu::ensure;

use crate::error::{DocumentNotFoundSnafu, DuplicateDocumentSnafu, SessionResult};
use crate::ids::DocumentId;

/// Immutable reference to a document the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub display_name: String,
    pub byte_size: u64,
    pub media_kind: String,
}

impl DocumentRef {
    pub fn new(
        id: DocumentId,
        display_name: impl Into<String>,
        byte_size: u64,
        media_kind: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            byte_size,
            media_kind: media_kind.into(),
        }
    }
}

/// Documents attached to the workspace, in upload order, plus the one (if
/// any) chosen as grounding context.
///
/// Invariant: `selected` always names an element of `documents`.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    documents: Vec<DocumentRef>,
    selected: Option<DocumentId>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: DocumentRef) -> SessionResult<()> {
        ensure!(
            self.get(document.id).is_none(),
            DuplicateDocumentSnafu {
                stage: "add-document",
                id: document.id,
            }
        );

        self.documents.push(document);
        Ok(())
    }

    /// Removes a document; absent ids are a no-op so stale delete actions are harmless.
    pub fn remove(&mut self, id: DocumentId) -> Option<DocumentRef> {
        let index = self.documents.iter().position(|document| document.id == id)?;

        if self.selected == Some(id) {
            self.selected = None;
        }

        Some(self.documents.remove(index))
    }

    pub fn select(&mut self, id: DocumentId) -> SessionResult<&DocumentRef> {
        let Some(index) = self.documents.iter().position(|document| document.id == id) else {
            return DocumentNotFoundSnafu {
                stage: "select-document",
                id,
            }
            .fail();
        };

        self.selected = Some(id);
        Ok(&self.documents[index])
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn has_any(&self) -> bool {
        !self.documents.is_empty()
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    pub fn get(&self, id: DocumentId) -> Option<&DocumentRef> {
        self.documents.iter().find(|document| document.id == id)
    }

    pub fn selected(&self) -> Option<&DocumentRef> {
        self.selected.and_then(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    fn document(name: &str) -> DocumentRef {
        DocumentRef::new(DocumentId::new_v7(), name, 1_024, "pdf")
    }

    fn assert_selection_is_member(registry: &DocumentRegistry) {
        if let Some(selected) = registry.selected {
            assert!(registry.get(selected).is_some());
        }
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut registry = DocumentRegistry::new();
        assert!(!registry.has_any());

        let names = ["syllabus.pdf", "rubric.docx", "notes.txt"];
        for name in names {
            registry.add(document(name)).unwrap();
        }

        assert!(registry.has_any());
        let listed = registry
            .documents()
            .iter()
            .map(|document| document.display_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(listed, names);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = DocumentRegistry::new();
        let syllabus = document("syllabus.pdf");
        registry.add(syllabus.clone()).unwrap();

        let error = registry.add(syllabus).unwrap_err();
        assert!(matches!(error, SessionError::DuplicateDocument { .. }));
        assert_eq!(registry.documents().len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = DocumentRegistry::new();
        let syllabus = document("syllabus.pdf");
        let rubric = document("rubric.docx");
        registry.add(syllabus.clone()).unwrap();
        registry.add(rubric.clone()).unwrap();

        assert_eq!(registry.remove(syllabus.id), Some(syllabus.clone()));
        let after_once = registry.documents().to_vec();

        assert_eq!(registry.remove(syllabus.id), None);
        assert_eq!(registry.documents(), after_once.as_slice());
        assert_eq!(registry.documents(), &[rubric]);
    }

    #[test]
    fn removing_the_selected_document_clears_selection() {
        let mut registry = DocumentRegistry::new();
        let syllabus = document("syllabus.pdf");
        let rubric = document("rubric.docx");
        registry.add(syllabus.clone()).unwrap();
        registry.add(rubric.clone()).unwrap();

        registry.select(syllabus.id).unwrap();
        registry.remove(rubric.id);
        assert_eq!(registry.selected(), Some(&syllabus));

        registry.remove(syllabus.id);
        assert_eq!(registry.selected(), None);
        assert_selection_is_member(&registry);
    }

    #[test]
    fn select_requires_a_registered_document() {
        let mut registry = DocumentRegistry::new();
        let error = registry.select(DocumentId::new_v7()).unwrap_err();

        assert!(matches!(error, SessionError::DocumentNotFound { .. }));
        assert_eq!(registry.selected(), None);
    }

    #[test]
    fn selection_stays_a_member_across_mixed_operations() {
        let mut registry = DocumentRegistry::new();
        let documents = (0..4)
            .map(|index| document(&format!("doc-{index}.pdf")))
            .collect::<Vec<_>>();

        for (step, document) in documents.iter().enumerate() {
            registry.add(document.clone()).unwrap();
            registry.select(document.id).unwrap();
            if step % 2 == 1 {
                registry.remove(documents[step - 1].id);
            }
            assert_selection_is_member(&registry);
        }

        registry.deselect();
        assert_eq!(registry.selected(), None);
        registry.deselect();
        assert_eq!(registry.selected(), None);

        for document in &documents {
            registry.remove(document.id);
            assert_selection_is_member(&registry);
        }
        assert!(!registry.has_any());
    }
}
