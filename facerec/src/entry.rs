use serde::{Deserialize, Serialize};
use std::path::Path;

/// A training image and the class it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub name: String,
    pub class_id: usize,
}

impl ImageEntry {
    pub fn new(name: impl Into<String>, class_id: usize) -> Self {
        Self {
            name: name.into(),
            class_id,
        }
    }
}

/// Class id encoded in an image file name, `{class}_{index}.ext`.
///
/// Only the final path component is inspected, so directories may use any
/// naming.
pub fn class_of(name: &str) -> Option<usize> {
    let file_name = Path::new(name).file_name()?.to_str()?;
    let (class, _) = file_name.split_once('_')?;
    class.parse().ok()
}

/// Whether two image names carry the same class id.
pub fn is_same_class(a: &str, b: &str) -> bool {
    matches!((class_of(a), class_of(b)), (Some(x), Some(y)) if x == y)
}

/// Final path component, for display.
pub fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(name)
}

/// Dense labels `0..num_classes` for the entries, in order of first appearance.
pub(crate) fn dense_labels(entries: &[ImageEntry]) -> (Vec<usize>, usize) {
    let mut seen: Vec<usize> = Vec::new();
    let labels = entries
        .iter()
        .map(|e| match seen.iter().position(|&c| c == e.class_id) {
            Some(i) => i,
            None => {
                seen.push(e.class_id);
                seen.len() - 1
            }
        })
        .collect();
    (labels, seen.len())
}
