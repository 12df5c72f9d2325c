//! Arena store of option records and their parent/child links.
//!
//! Records live in a `Vec` indexed by `id - 1`; ids are handed out in
//! creation order and never reused. Because a parent always exists before
//! its children, ascending id order is also a parent-before-child order.

use arbor_core::{ArborError, ArborResult, OptionId, OptionRecord};

/// The canonical set of options.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    options: Vec<OptionRecord>,
    children: Vec<Vec<OptionId>>,
}

impl OptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted record must carry.
    pub fn next_id(&self) -> OptionId {
        OptionId::new(self.options.len() as u64 + 1)
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no option exists.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    fn index(&self, id: OptionId) -> ArborResult<usize> {
        usize::try_from(id.value())
            .ok()
            .and_then(|value| value.checked_sub(1))
            .filter(|idx| *idx < self.options.len())
            .ok_or_else(|| ArborError::not_found(id))
    }

    /// Returns true if the id exists.
    pub fn contains(&self, id: OptionId) -> bool {
        self.index(id).is_ok()
    }

    /// Appends a record.
    ///
    /// The record must carry [`next_id`](Self::next_id) and, for a child,
    /// reference an existing parent.
    pub fn insert(&mut self, record: OptionRecord) -> ArborResult<OptionId> {
        let id = self.next_id();
        if record.id != id {
            return Err(ArborError::invalid_parameter(format!(
                "record carries id {}, expected {id}",
                record.id
            )));
        }
        let parent = if record.is_root() {
            None
        } else {
            Some(self.index(record.parent_id)?)
        };

        self.options.push(record);
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[parent].push(id);
        }
        Ok(id)
    }

    /// Removes the most recently inserted record, undoing [`insert`](Self::insert).
    pub(crate) fn pop(&mut self) -> Option<OptionRecord> {
        let record = self.options.pop()?;
        self.children.pop();
        if let Ok(parent) = self.index(record.parent_id) {
            self.children[parent].retain(|c| *c != record.id);
        }
        Some(record)
    }

    /// Looks up a record.
    pub fn get(&self, id: OptionId) -> ArborResult<&OptionRecord> {
        let idx = self.index(id)?;
        Ok(&self.options[idx])
    }

    /// Looks up a record for mutation.
    pub fn get_mut(&mut self, id: OptionId) -> ArborResult<&mut OptionRecord> {
        let idx = self.index(id)?;
        Ok(&mut self.options[idx])
    }

    /// Direct children in ascending id order.
    pub fn children(&self, id: OptionId) -> ArborResult<&[OptionId]> {
        let idx = self.index(id)?;
        Ok(&self.children[idx])
    }

    /// Root-most ancestor of an option (itself for a root).
    pub fn root_of(&self, id: OptionId) -> ArborResult<OptionId> {
        let mut current = self.get(id)?;
        while !current.is_root() {
            current = self.get(current.parent_id)?;
        }
        Ok(current.id)
    }

    /// The option and all its descendants, in ascending id order.
    pub fn subtree(&self, id: OptionId) -> ArborResult<Vec<OptionId>> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            stack.extend_from_slice(self.children(next)?);
            ids.push(next);
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Every record in id order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionRecord> {
        self.options.iter()
    }
}
