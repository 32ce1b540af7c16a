//! Approver-group checks for guarded transitions

use std::collections::HashMap;

use uuid::Uuid;

use crate::model::Transition;
use crate::persistence::{DefinitionStore, StoreError};

/// Answers "may this actor take this transition" for one actor.
///
/// Membership lookups are cached per group for the lifetime of the resolver,
/// which is a single engine call.
pub(crate) struct ApproverResolver<'a, S: ?Sized> {
    store: &'a S,
    actor: Uuid,
    memberships: HashMap<Uuid, bool>,
}

impl<'a, S: DefinitionStore + ?Sized> ApproverResolver<'a, S> {
    pub(crate) fn new(store: &'a S, actor: Uuid) -> Self {
        Self {
            store,
            actor,
            memberships: HashMap::new(),
        }
    }

    /// Unguarded transitions are open to anyone
    pub(crate) async fn is_permitted(
        &mut self,
        transition: &Transition,
    ) -> Result<bool, StoreError> {
        let Some(group_id) = transition.approver_group_id else {
            return Ok(true);
        };

        if let Some(&member) = self.memberships.get(&group_id) {
            return Ok(member);
        }

        let member = self.store.is_group_member(group_id, self.actor).await?;
        self.memberships.insert(group_id, member);
        Ok(member)
    }

    /// First candidate, in the given order, the actor may take
    pub(crate) async fn select<'t>(
        &mut self,
        candidates: &[&'t Transition],
    ) -> Result<Option<&'t Transition>, StoreError> {
        for candidate in candidates {
            if self.is_permitted(candidate).await? {
                return Ok(Some(*candidate));
            }
        }
        Ok(None)
    }

    /// Every transition the actor may take, order preserved
    pub(crate) async fn permitted<'t>(
        &mut self,
        transitions: impl IntoIterator<Item = &'t Transition>,
    ) -> Result<Vec<Transition>, StoreError> {
        let mut allowed = Vec::new();
        for transition in transitions {
            if self.is_permitted(transition).await? {
                allowed.push(transition.clone());
            }
        }
        Ok(allowed)
    }
}
