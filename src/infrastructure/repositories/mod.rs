pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryScheduledMessageRepository;
pub use postgres::{PgPool, PostgresScheduledMessageRepository};
