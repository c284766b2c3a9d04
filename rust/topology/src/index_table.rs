// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal-scoped visited marks, addressed by entity index.

use crate::arena::Model;

/// Dense visited flags for one traversal, one slot per model index.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    marks: Vec<bool>,
}

impl IndexTable {
    /// A table covering every index currently handed out by `model`.
    pub fn for_model(model: &Model) -> Self {
        Self {
            marks: vec![false; model.max_index() + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Grows the table to cover `model` if its index space has grown.
    ///
    /// Existing marks are kept and the new tail starts unmarked.
    pub fn cover(&mut self, model: &Model) {
        let needed = model.max_index() + 1;
        if needed > self.marks.len() {
            tracing::warn!(
                from = self.marks.len(),
                to = needed,
                "index table enlarged"
            );
            self.marks.resize(needed, false);
        }
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.marks.get(index).copied().unwrap_or(false)
    }

    /// Marks `index`. Returns `true` if it was not marked before.
    pub fn mark(&mut self, index: usize) -> bool {
        if index >= self.marks.len() {
            self.marks.resize(index + 1, false);
        }
        !std::mem::replace(&mut self.marks[index], true)
    }

    /// Clears every mark.
    pub fn reset(&mut self) {
        self.marks.iter_mut().for_each(|m| *m = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn mark_reports_first_visit() {
        let model = Model::new();
        let mut tab = IndexTable::for_model(&model);
        assert_eq!(tab.len(), 1);
        assert!(tab.mark(5));
        assert!(!tab.mark(5));
        assert!(tab.is_marked(5));
        assert!(!tab.is_marked(100));
    }

    #[test]
    fn cover_preserves_marks() {
        let mut model = Model::new();
        model.add_region();
        let mut tab = IndexTable::for_model(&model);
        tab.mark(1);
        for i in 0..4 {
            model.add_vertex(Point3::new(i as f64, 0.0, 0.0));
        }
        tab.cover(&model);
        assert_eq!(tab.len(), model.max_index() + 1);
        assert!(tab.is_marked(1));
        assert!(!tab.is_marked(model.max_index()));

        tab.reset();
        assert!(!tab.is_marked(1));
    }
}
