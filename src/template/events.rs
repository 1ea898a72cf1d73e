use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateEventKind {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    AfterLoad,
}

/// Lifecycle notification for one aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateEvent {
    pub kind: AggregateEventKind,
    pub entity: String,
    /// Known id; `None` before the first insert generates one.
    pub id: Option<JsonValue>,
    /// The aggregate document, when the operation had one.
    pub document: Option<JsonValue>,
}

impl AggregateEvent {
    pub fn new(kind: AggregateEventKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            id: None,
            document: None,
        }
    }

    pub fn with_id(mut self, id: &JsonValue) -> Self {
        self.id = (!id.is_null()).then(|| id.clone());
        self
    }

    pub fn with_document(mut self, document: &JsonValue) -> Self {
        self.document = Some(document.clone());
        self
    }
}

pub trait AggregateEventListener: Send + Sync {
    fn on_event(&self, event: &AggregateEvent);
}

impl<F> AggregateEventListener for F
where
    F: Fn(&AggregateEvent) + Send + Sync,
{
    fn on_event(&self, event: &AggregateEvent) {
        self(event)
    }
}
