pub mod client;
pub mod injected;
pub mod serialization;

pub use client::{
    ClientConfig, ConnectionStats, DeliveryClient, DeliveryError, DeliveryReceipt,
    HttpDeliveryClient,
};
pub use injected::FnDeliveryClient;
pub use serialization::{
    BatchSerializer, LogDocument, LogItemAttributes, LogItemResource, MetadataResource,
    SerializationError,
};
