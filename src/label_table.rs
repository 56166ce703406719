//! Mapping from label names to instruction indices.

use std::collections::HashMap;

/// Where a label points and where it was defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelInfo {
    /// Index of the instruction following the label. May equal the program length.
    pub index: usize,

    /// 1-based source line of the definition.
    pub line: usize,
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct LabelTable {
    inner: HashMap<String, LabelInfo>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable {
            inner: HashMap::new(),
        }
    }

    /// Defines a label.
    ///
    /// # Errors
    /// The earlier definition if the label already exists.
    pub(crate) fn define(&mut self, label: &str, index: usize, line: usize) -> Result<(), LabelInfo> {
        if let Some(existing) = self.inner.get(label) {
            return Err(*existing);
        }

        self.inner.insert(label.to_string(), LabelInfo { index, line });

        Ok(())
    }

    /// Instruction index the label points to.
    pub fn get(&self, label: &str) -> Option<usize> {
        self.inner.get(label).map(|info| info.index)
    }

    pub fn info(&self, label: &str) -> Option<&LabelInfo> {
        self.inner.get(label)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All labels ordered by the index they point to, then by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelInfo)> {
        let mut labels: Vec<_> = self.inner.iter()
            .map(|(label, info)| (label.as_str(), info))
            .collect();

        labels.sort_by(|a, b| (a.1.index, a.0).cmp(&(b.1.index, b.0)));
        labels.into_iter()
    }
}

#[test]
fn test_define_twice() {
    let mut table = LabelTable::new();

    assert_eq!(table.define("main", 0, 1), Ok(()));
    assert_eq!(table.define("main", 4, 7), Err(LabelInfo { index: 0, line: 1 }));
    assert_eq!(table.get("main"), Some(0));
    assert_eq!(table.get("other"), None);
}
