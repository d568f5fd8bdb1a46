pub mod dispatch_worker;
pub mod message_dispatcher;
