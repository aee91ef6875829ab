pub mod avro;
pub mod memory;
pub mod registry;

pub use avro::{AvroCodec, MAGIC_BYTE};
pub use memory::MemorySchemaRegistry;
pub use registry::{subject_for_topic, HttpSchemaRegistry, RegisteredSchema, SchemaRegistry};
