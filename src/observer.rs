//! Instrumentation hook for sends.
//!
//! Channels call an optional [`SendObserver`] at the start and end of every
//! send. Metrics or tracing exporters plug in here without the channel
//! depending on them.

use crate::kafka::DeliveryResult;
use crate::Error;

/// What is being sent.
#[derive(Debug, Clone, Copy)]
pub struct SendContext<'a> {
    pub channel: &'a str,
    pub topic: &'a str,
    pub key: Option<i64>,
}

/// All methods default to doing nothing.
pub trait SendObserver: Send + Sync {
    fn on_send(&self, _ctx: &SendContext<'_>) {}

    fn on_delivered(&self, _ctx: &SendContext<'_>, _result: &DeliveryResult) {}

    fn on_failed(&self, _ctx: &SendContext<'_>, _error: &Error) {}
}
