//! Migration progress events and event handling

use crate::features::migration::remap::EntityKind;

/// Events that can occur during migration
#[derive(Debug, Clone)]
pub enum MigrationEvent {
    Started,
    StepBegun {
        step: String,
    },
    StepCompleted {
        step: String,
        duration_ms: u64,
    },
    EntityMigrated {
        kind: EntityKind,
        source_id: String,
        dest_id: String,
    },
    EntityFailed {
        kind: EntityKind,
        id: String,
        error: String,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
    Completed {
        success: bool,
    },
}

/// Event handler for migration events
pub trait MigrationEventHandler {
    fn handle_event(&self, event: MigrationEvent);
}

/// Composite event handler that forwards events to multiple handlers
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn MigrationEventHandler + Send + Sync>>,
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler<H: MigrationEventHandler + Send + Sync + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }
}

impl MigrationEventHandler for CompositeEventHandler {
    fn handle_event(&self, event: MigrationEvent) {
        for handler in &self.handlers {
            handler.handle_event(event.clone());
        }
    }
}

/// Event handler that writes every event to the tracing pipeline (and
/// through it to the console and the log file).
pub struct LoggingEventHandler;

impl MigrationEventHandler for LoggingEventHandler {
    fn handle_event(&self, event: MigrationEvent) {
        match event {
            MigrationEvent::Started => {
                tracing::info!("Migration started");
            }
            MigrationEvent::StepBegun { step } => {
                tracing::info!("=== {} ===", step);
            }
            MigrationEvent::StepCompleted { step, duration_ms } => {
                tracing::info!("Step completed: {} ({}ms)", step, duration_ms);
            }
            MigrationEvent::EntityMigrated {
                kind,
                source_id,
                dest_id,
            } => {
                tracing::debug!("Migrated {} {} -> {}", kind, source_id, dest_id);
            }
            MigrationEvent::EntityFailed { kind, id, error } => {
                tracing::error!("Failed to migrate {} {}: {}", kind, id, error);
            }
            MigrationEvent::Warning { message } => {
                tracing::warn!("{}", message);
            }
            MigrationEvent::Error { message } => {
                tracing::error!("{}", message);
            }
            MigrationEvent::Completed { success } => {
                if success {
                    tracing::info!("Migration process completed successfully!");
                } else {
                    tracing::error!("Migration process completed with failures");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl MigrationEventHandler for RecordingHandler {
        fn handle_event(&self, event: MigrationEvent) {
            self.seen.lock().unwrap().push(format!("{:?}", event));
        }
    }

    #[test]
    fn test_composite_forwards_to_all_handlers() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let mut composite = CompositeEventHandler::new();
        composite.add_handler(RecordingHandler { seen: first.clone() });
        composite.add_handler(RecordingHandler { seen: second.clone() });

        composite.handle_event(MigrationEvent::Started);
        composite.handle_event(MigrationEvent::Completed { success: true });

        assert_eq!(first.lock().unwrap().len(), 2);
        assert_eq!(second.lock().unwrap().len(), 2);
    }
}
