//! Workflow definition graph
//!
//! A definition is an immutable-per-version graph of [`Step`]s connected by
//! [`Transition`]s. Steps and transitions live in ordered vectors on the
//! definition and reference each other by identity only; stored order is
//! significant for transition selection and approver-group resolution.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Role a step plays in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Entry point; exactly one per definition
    Start,
    /// A unit of human work (usually an approval)
    Task,
    /// A branching point
    Decision,
    /// Terminal step; reaching it completes the instance
    End,
}

impl std::fmt::Display for StepRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Task => write!(f, "task"),
            Self::Decision => write!(f, "decision"),
            Self::End => write!(f, "end"),
        }
    }
}

/// A node of the definition graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Step {
    pub id: Uuid,
    pub name: String,
    pub role: StepRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Group explicitly responsible for this step. When unset the group is
    /// inferred from incoming transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_group_id: Option<Uuid>,
}

impl Step {
    pub fn new(name: impl Into<String>, role: StepRole) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            role,
            description: None,
            approver_group_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_approver_group(mut self, group_id: Uuid) -> Self {
        self.approver_group_id = Some(group_id);
        self
    }

    pub fn is_end(&self) -> bool {
        self.role == StepRole::End
    }
}

/// A named, optionally group-guarded edge between two steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Transition {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub from_step_id: Uuid,
    pub to_step_id: Uuid,
    /// Action name, compared case-insensitively (e.g. "Approve")
    pub action_name: String,
    /// Guard expression; carried as metadata, never evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Group whose members may take this transition. `None` means anyone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_group_id: Option<Uuid>,
}

impl Transition {
    /// Create a transition. The owning definition is assigned by
    /// [`WorkflowDefinition::add_transition`].
    pub fn new(from_step_id: Uuid, to_step_id: Uuid, action_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            definition_id: Uuid::nil(),
            from_step_id,
            to_step_id,
            action_name: action_name.into(),
            condition_expression: None,
            approver_group_id: None,
        }
    }

    pub fn with_approver_group(mut self, group_id: Uuid) -> Self {
        self.approver_group_id = Some(group_id);
        self
    }

    pub fn with_condition(mut self, expression: impl Into<String>) -> Self {
        self.condition_expression = Some(expression.into());
        self
    }

    /// Case-insensitive action match
    pub fn matches_action(&self, action_name: &str) -> bool {
        self.action_name.to_lowercase() == action_name.to_lowercase()
    }
}

/// Structural problems in a definition graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("definition has no start step")]
    MissingStart,

    #[error("definition has {0} start steps, expected exactly one")]
    MultipleStarts(usize),

    #[error("definition has no end step")]
    MissingEnd,

    #[error("end step '{0}' has outgoing transitions")]
    EndHasOutgoing(String),

    #[error("step '{0}' is not reachable from the start step")]
    Unreachable(String),

    #[error("transition {transition_id} references unknown step {step_id}")]
    UnknownStep { transition_id: Uuid, step_id: Uuid },

    #[error("transition {0} has an empty action name")]
    EmptyActionName(Uuid),
}

/// Directed graph of steps and transitions for one request type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub request_type_id: Uuid,
    pub is_active: bool,
    pub steps: Vec<Step>,
    pub transitions: Vec<Transition>,
}

impl WorkflowDefinition {
    /// Create an empty, active definition
    pub fn new(name: impl Into<String>, request_type_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            request_type_id,
            is_active: true,
            steps: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Append a step and return its id
    pub fn add_step(&mut self, step: Step) -> Uuid {
        let id = step.id;
        self.steps.push(step);
        id
    }

    /// Append a transition owned by this definition and return its id
    pub fn add_transition(&mut self, mut transition: Transition) -> Uuid {
        transition.definition_id = self.id;
        let id = transition.id;
        self.transitions.push(transition);
        id
    }

    pub fn step(&self, step_id: Uuid) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn start_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.role == StepRole::Start)
    }

    /// Transitions leaving `step_id`, in stored order
    pub fn outgoing(&self, step_id: Uuid) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.from_step_id == step_id)
    }

    /// Transitions entering `step_id`, in stored order
    pub fn incoming(&self, step_id: Uuid) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.to_step_id == step_id)
    }

    /// Outgoing transitions of `step_id` whose action matches `action_name`
    pub fn transitions_for_action(&self, step_id: Uuid, action_name: &str) -> Vec<&Transition> {
        self.outgoing(step_id)
            .filter(|t| t.matches_action(action_name))
            .collect()
    }

    /// Approver group responsible for a step once it becomes current.
    ///
    /// An explicit group on the step wins. Otherwise the group of the first
    /// incoming transition (stored order) that names one is used.
    pub fn assigned_group_for(&self, step: &Step) -> Option<Uuid> {
        step.approver_group_id
            .or_else(|| self.incoming(step.id).find_map(|t| t.approver_group_id))
    }

    /// Step an instance starts on.
    ///
    /// When exactly one transition leaves Start, Start is a pass-through and
    /// the target of that transition is returned; otherwise Start itself.
    pub fn initial_step(&self) -> Result<&Step, DefinitionError> {
        let start = self.start_step().ok_or(DefinitionError::MissingStart)?;
        let mut outgoing = self.outgoing(start.id);

        match (outgoing.next(), outgoing.next()) {
            (Some(only), None) => self.step(only.to_step_id).ok_or(DefinitionError::UnknownStep {
                transition_id: only.id,
                step_id: only.to_step_id,
            }),
            _ => Ok(start),
        }
    }

    /// Every transition endpoint must name a step of this definition
    pub fn check_references(&self) -> Result<(), DefinitionError> {
        let known: HashSet<Uuid> = self.steps.iter().map(|s| s.id).collect();

        for t in &self.transitions {
            for step_id in [t.from_step_id, t.to_step_id] {
                if !known.contains(&step_id) {
                    return Err(DefinitionError::UnknownStep {
                        transition_id: t.id,
                        step_id,
                    });
                }
            }
        }

        Ok(())
    }

    /// Full structural validation.
    ///
    /// Checks: exactly one Start, at least one End, End steps have no
    /// outgoing transitions, every step is reachable from Start, every
    /// transition has an action name and known endpoints.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.check_references()?;

        if let Some(t) = self
            .transitions
            .iter()
            .find(|t| t.action_name.trim().is_empty())
        {
            return Err(DefinitionError::EmptyActionName(t.id));
        }

        let starts: Vec<&Step> = self
            .steps
            .iter()
            .filter(|s| s.role == StepRole::Start)
            .collect();
        let start = match starts.as_slice() {
            [] => return Err(DefinitionError::MissingStart),
            [start] => *start,
            many => return Err(DefinitionError::MultipleStarts(many.len())),
        };

        let ends: Vec<&Step> = self.steps.iter().filter(|s| s.is_end()).collect();
        if ends.is_empty() {
            return Err(DefinitionError::MissingEnd);
        }
        if let Some(end) = ends.iter().find(|e| self.outgoing(e.id).next().is_some()) {
            return Err(DefinitionError::EndHasOutgoing(end.name.clone()));
        }

        let reachable = self.reachable_from(start.id);
        if let Some(orphan) = self.steps.iter().find(|s| !reachable.contains(&s.id)) {
            return Err(DefinitionError::Unreachable(orphan.name.clone()));
        }

        Ok(())
    }

    fn reachable_from(&self, origin: Uuid) -> HashSet<Uuid> {
        let mut seen = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);

        while let Some(step_id) = queue.pop_front() {
            for t in self.outgoing(step_id) {
                if seen.insert(t.to_step_id) {
                    queue.push_back(t.to_step_id);
                }
            }
        }

        seen
    }
}
