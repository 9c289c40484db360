//! Merge algorithm.
//!
//! Combines the documents of a batch into one synthetic query operation and
//! folds their variables into one map. Both are pure and order preserving.
//!
//! Nothing is validated: duplicate variable names, colliding field aliases
//! and duplicate fragment names are passed through as-is and left for the
//! server to reject.

use crate::Variables;
use crate::document::{Document, OperationKind};
use async_graphql_value::Name;

/// Default name of the synthetic merged operation.
pub const MERGED_OPERATION_NAME: &str = "MergedOperation";

/// Merges documents into one query named [`MERGED_OPERATION_NAME`].
#[must_use]
pub fn merge_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Document {
    merge_documents_named(documents, MERGED_OPERATION_NAME)
}

/// Merges documents into one query with the given operation name.
///
/// Variable definitions, top-level selections and fragments are each the
/// concatenation, in input order, of the corresponding parts of every input.
#[must_use]
pub fn merge_documents_named<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    operation_name: &str,
) -> Document {
    let mut merged = Document {
        operation_type: OperationKind::Query,
        name: Some(Name::new(operation_name)),
        variable_definitions: Vec::new(),
        selections: Vec::new(),
        fragments: Vec::new(),
    };

    for document in documents {
        merged
            .variable_definitions
            .extend(document.variable_definitions.iter().cloned());
        merged.selections.extend(document.selections.iter().cloned());
        merged.fragments.extend(document.fragments.iter().cloned());
    }

    merged
}

/// Shallow union of variable maps; later maps overwrite earlier keys.
#[must_use]
pub fn merge_variables<'a>(maps: impl IntoIterator<Item = &'a Variables>) -> Variables {
    maps.into_iter().fold(Variables::new(), |mut acc, variables| {
        acc.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        acc
    })
}
