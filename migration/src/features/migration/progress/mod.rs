pub mod events;

pub use events::{
    CompositeEventHandler, LoggingEventHandler, MigrationEvent, MigrationEventHandler,
};
