use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;

/// Index of an action in an [`ActionVocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

impl ActionId {
    /// The unique initial state of every session.
    pub const START: ActionId = ActionId(0);
    /// The absorbing terminal state.
    pub const END: ActionId = ActionId(1);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered list of action names. Position 0 is `start`, position 1 is `end`.
/// Order is the index basis for every transition matrix.
#[derive(Debug, Clone)]
pub struct ActionVocabulary {
    actions: Vec<String>,
}

impl ActionVocabulary {
    pub fn new<I, S>(actions: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        if actions.len() < 2 {
            return Err(ValidationError::VocabularyTooSmall(actions.len()));
        }

        let mut seen = HashSet::with_capacity(actions.len());
        for (pos, action) in actions.iter().enumerate() {
            if action.trim().is_empty() {
                return Err(ValidationError::BlankAction(pos));
            }
            if !seen.insert(action.as_str()) {
                return Err(ValidationError::DuplicateAction(action.clone()));
            }
        }

        Ok(Self { actions })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn start(&self) -> ActionId {
        ActionId::START
    }

    pub fn end(&self) -> ActionId {
        ActionId::END
    }

    pub fn name(&self, id: ActionId) -> Option<&str> {
        self.actions.get(id.0).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<ActionId> {
        self.actions.iter().position(|a| a == name).map(ActionId)
    }

    /// Token → numeric index with `pad_token` reserved at 0 and every action
    /// shifted up by one.
    pub fn padded_index(&self, pad_token: &str) -> HashMap<String, usize> {
        let mut index = HashMap::with_capacity(self.actions.len() + 1);
        index.insert(pad_token.to_string(), 0);
        for (i, action) in self.actions.iter().enumerate() {
            index.insert(action.clone(), i + 1);
        }
        index
    }

    /// Resolve a trajectory of ids into action tokens.
    ///
    /// Panics on an id outside the vocabulary. Ids produced by a model built
    /// against this vocabulary are always in range.
    pub fn tokens(&self, ids: &[ActionId]) -> Vec<String> {
        ids.iter().map(|id| self.actions[id.0].clone()).collect()
    }
}
