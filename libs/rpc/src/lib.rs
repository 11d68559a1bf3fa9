//! Protobuf and gRPC bindings for the inventory service.
//!
//! Generated from `proto/` and checked in; regenerate with `buf generate`
//! (prost + tonic 0.14 plugins) after editing the protos.

pub mod inventory {
    pub mod v1 {
        include!("generated/inventory/v1/inventory.v1.rs");
    }
}
