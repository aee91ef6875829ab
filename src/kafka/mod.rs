pub mod topology;
pub mod transport;

#[cfg(test)]
mod tests;

pub use topology::{ClusterTopology, MetadataSource, MetadataTopology, StaticTopology};
pub use transport::{DeliveryResult, KafkaTransport, OutboundRecord, Transport};
