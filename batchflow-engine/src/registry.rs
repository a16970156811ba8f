//! Workflow registry
//!
//! Maps a workflow type to the constructor of its producer. Types are
//! registered once at startup; every lookup builds a new producer.

use batchflow_core::domain::workflow::{WorkflowType, builtin};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;
use crate::workflow::{Workflow, WorkflowContext, WorkflowKind};

/// Builds a producer for the type it is registered under
pub type WorkflowConstructor =
    Arc<dyn Fn(WorkflowType, &WorkflowContext) -> Box<dyn Workflow> + Send + Sync>;

/// Registry of workflow types
pub struct WorkflowRegistry {
    context: WorkflowContext,
    constructors: BTreeMap<WorkflowType, WorkflowConstructor>,
}

impl WorkflowRegistry {
    /// Creates an empty registry whose producers share `context`
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            context,
            constructors: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in workflow types
    pub fn with_builtin(context: WorkflowContext) -> Result<Self, EngineError> {
        let mut registry = Self::new(context);
        registry.register(builtin::K8S_DETAILS, WorkflowKind::ClusterInfo)?;
        registry.register(builtin::TESK_DEPLOY, WorkflowKind::Deploy)?;
        registry.register(builtin::TESK_VERIFY, WorkflowKind::Verify)?;
        Ok(registry)
    }

    /// Registers a type backed by a built-in workflow
    ///
    /// # Errors
    /// `DuplicateType` if the type is already registered; the existing
    /// registration stays in place.
    pub fn register(
        &mut self,
        workflow_type: impl Into<WorkflowType>,
        kind: WorkflowKind,
    ) -> Result<(), EngineError> {
        self.register_fn(workflow_type, move |workflow_type, context| {
            kind.instantiate(workflow_type, context)
        })
    }

    /// Registers a type backed by an arbitrary constructor
    pub fn register_fn<F>(
        &mut self,
        workflow_type: impl Into<WorkflowType>,
        constructor: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(WorkflowType, &WorkflowContext) -> Box<dyn Workflow> + Send + Sync + 'static,
    {
        let workflow_type = workflow_type.into();
        if self.constructors.contains_key(&workflow_type) {
            return Err(EngineError::DuplicateType(workflow_type));
        }

        debug!("Registered workflow type {}", workflow_type);
        self.constructors.insert(workflow_type, Arc::new(constructor));
        Ok(())
    }

    /// Builds a new producer for `workflow_type`
    ///
    /// # Errors
    /// `UnknownType` if the type was never registered.
    pub fn get_workflow(&self, workflow_type: &WorkflowType) -> Result<Box<dyn Workflow>, EngineError> {
        let constructor = self
            .constructors
            .get(workflow_type)
            .ok_or_else(|| EngineError::UnknownType(workflow_type.clone()))?;

        Ok(constructor(workflow_type.clone(), &self.context))
    }

    pub fn contains(&self, workflow_type: &WorkflowType) -> bool {
        self.constructors.contains_key(workflow_type)
    }

    /// Registered types, sorted by name
    pub fn registered_types(&self) -> impl Iterator<Item = &WorkflowType> {
        self.constructors.keys()
    }
}
