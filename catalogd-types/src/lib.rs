//! Wire types for the metadata catalogue service.
//!
//! `pb` holds the `prost`-generated messages compiled from
//! `proto/metadata.proto` (the schema-first IDL required by spec.md §6).
//! `codec` converts between these wire messages and the native Rust types
//! primitive values are decoded into. `uuid_codec` handles the UUID
//! string/byte representations used both on the wire and in storage.

pub mod codec;
pub mod uuid_codec;

pub mod pb {
    tonic::include_proto!("catalogd.metadata.v1");
}

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;
