pub mod cancel_message;
pub mod estimate_cost;
pub mod force_dispatch;
pub mod get_message;
pub mod queue_health;
pub mod reconcile_delivery;
pub mod schedule_message;
