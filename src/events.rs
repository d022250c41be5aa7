use crate::entity::{EntityId, EntityType};
use crate::gizmo::GizmoMode;
use crate::selection::SelectionTarget;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    SelectionChanged { previous: Option<SelectionTarget>, current: Option<SelectionTarget> },
    GizmoModeChanged { mode: GizmoMode },
    RenderSettingsChanged,
    EnvironmentChanged,
    EntityAdded { id: EntityId, entity_type: EntityType },
    EntityRemoved { id: EntityId },
    EntityLoaded { id: EntityId, has_skeleton: bool },
    HistoryChanged { can_undo: bool, can_redo: bool },
    ProjectLoaded { entities: usize },
}

fn describe(target: &Option<SelectionTarget>) -> String {
    target.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string())
}

impl fmt::Display for EditorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorEvent::SelectionChanged { previous, current } => {
                write!(f, "SelectionChanged previous={} current={}", describe(previous), describe(current))
            }
            EditorEvent::GizmoModeChanged { mode } => write!(f, "GizmoModeChanged mode={mode}"),
            EditorEvent::RenderSettingsChanged => write!(f, "RenderSettingsChanged"),
            EditorEvent::EnvironmentChanged => write!(f, "EnvironmentChanged"),
            EditorEvent::EntityAdded { id, entity_type } => write!(f, "EntityAdded id={id} type={entity_type}"),
            EditorEvent::EntityRemoved { id } => write!(f, "EntityRemoved id={id}"),
            EditorEvent::EntityLoaded { id, has_skeleton } => {
                write!(f, "EntityLoaded id={id} skeleton={has_skeleton}")
            }
            EditorEvent::HistoryChanged { can_undo, can_redo } => {
                write!(f, "HistoryChanged undo={can_undo} redo={can_redo}")
            }
            EditorEvent::ProjectLoaded { entities } => write!(f, "ProjectLoaded entities={entities}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&EditorEvent)>;

/// Delivers events to subscribers immediately and queues them for `drain`.
#[derive(Default)]
pub struct EventBus {
    events: Vec<EditorEvent>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl EventBus {
    pub fn push(&mut self, event: EditorEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&event);
        }
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<EditorEvent> {
        self.events.drain(..).collect()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EditorEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
