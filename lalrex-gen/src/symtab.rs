use indexmap::IndexSet;
use smartstring::alias::String;

/// Insertion-ordered table of symbol names.
///
/// Indices are handed out in order of first insertion and never change.
#[derive(Default, Debug, Clone)]
pub struct Symtab {
    set: IndexSet<String>,
}

impl Symtab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sym` if it is new and returns its index.
    pub fn add(&mut self, sym: &str) -> usize {
        if let Some(idx) = self.set.get_index_of(sym) {
            return idx;
        }
        self.set.insert_full(sym.into()).0
    }

    pub fn idx(&self, sym: &str) -> Option<usize> {
        self.set.get_index_of(sym)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }
}
