// @generated
// This file is @generated by prost-build.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct AddProductRequest {
    #[prost(string, tag = "1")]
    pub product_code: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub brand: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub code: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub name: ::prost::alloc::string::String,
}
/// Domain failures (duplicate codes, invalid fields) are reported in-band
/// with success = false rather than as a gRPC status.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct AddProductResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}
include!("inventory.v1.tonic.rs");
// @@protoc_insertion_point(module)
