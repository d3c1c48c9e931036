//! Handler Registry
//!
//! Startup table mapping each capability trait to the constructor of the
//! pipeline that implements it. Handlers declare their own capabilities
//! through `RegisterHandler`; resolution builds one instance per capability
//! per request scope.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// Command or query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Command,
    Query,
}

/// Pipeline a registered handler runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineShape {
    Command,
    UnitOfWork,
    Transactional,
    Query,
}

impl PipelineShape {
    pub fn kind(self) -> HandlerKind {
        match self {
            PipelineShape::Query => HandlerKind::Query,
            _ => HandlerKind::Command,
        }
    }
}

/// A capability known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCapability {
    pub capability: &'static str,
    pub shape: PipelineShape,
}

type Instance = Box<dyn Any + Send + Sync>;
type Constructor<S> = Arc<dyn Fn(&RequestScope<S>) -> Instance + Send + Sync>;

struct Registration<S> {
    capability: &'static str,
    shape: PipelineShape,
    construct: Constructor<S>,
}

/// Implemented by each concrete handler to declare its capabilities
pub trait RegisterHandler<S> {
    fn register(registry: &mut HandlerRegistry<S>);
}

pub struct HandlerRegistry<S> {
    registrations: HashMap<TypeId, Registration<S>>,
}

impl<S: 'static> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }

    /// Register a constructor for capability `C` (usually `dyn Trait`)
    pub fn register<C, F>(&mut self, shape: PipelineShape, construct: F) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&RequestScope<S>) -> Arc<C> + Send + Sync + 'static,
    {
        let capability = type_name::<C>();
        let registration = Registration {
            capability,
            shape,
            construct: Arc::new(move |scope: &RequestScope<S>| -> Instance {
                Box::new(construct(scope))
            }),
        };

        if self
            .registrations
            .insert(TypeId::of::<C>(), registration)
            .is_some()
        {
            tracing::warn!("Capability '{}' registered more than once; keeping the last", capability);
        }

        self
    }

    /// Let a handler type add its own registrations
    pub fn add<H: RegisterHandler<S>>(&mut self) -> &mut Self {
        H::register(self);
        self
    }

    pub fn is_registered<C: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// All registered capabilities, ordered by name
    pub fn capabilities(&self) -> Vec<RegisteredCapability> {
        let mut capabilities: Vec<_> = self
            .registrations
            .values()
            .map(|registration| RegisteredCapability {
                capability: registration.capability,
                shape: registration.shape,
            })
            .collect();
        capabilities.sort_by_key(|entry| entry.capability);
        capabilities
    }

    pub fn commands(&self) -> Vec<RegisteredCapability> {
        self.of_kind(HandlerKind::Command)
    }

    pub fn queries(&self) -> Vec<RegisteredCapability> {
        self.of_kind(HandlerKind::Query)
    }

    fn of_kind(&self, kind: HandlerKind) -> Vec<RegisteredCapability> {
        self.capabilities()
            .into_iter()
            .filter(|entry| entry.shape.kind() == kind)
            .collect()
    }
}

impl<S: 'static> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request container for resolved handlers
pub struct RequestScope<S> {
    id: Uuid,
    state: S,
    registry: Arc<HandlerRegistry<S>>,
    instances: DashMap<TypeId, Instance>,
}

impl<S: 'static> RequestScope<S> {
    pub fn new(registry: Arc<HandlerRegistry<S>>, state: S) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(scope = %id, "Request scope opened");

        Self {
            id,
            state,
            registry,
            instances: DashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Resolve capability `C`, building it on first use within this scope
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        let type_id = TypeId::of::<C>();

        if let Some(existing) = self.instances.get(&type_id) {
            return (**existing).downcast_ref::<Arc<C>>().cloned();
        }

        // No map guard is held here, so constructors may resolve other capabilities
        let registration = self.registry.registrations.get(&type_id)?;
        let instance = (registration.construct)(self);

        let stored = self.instances.entry(type_id).or_insert(instance);
        let resolved = (**stored).downcast_ref::<Arc<C>>().cloned();
        resolved
    }
}
