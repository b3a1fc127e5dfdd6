//! Federation address registry
//!
//! Maps multisig addresses to the public keys and threshold that define
//! them, and clients to the addresses assigned to them.

pub mod address;

pub use address::{
    sign_threshold, AddressRegistry, MemoryAddressRegistry, RegisteredAddress, RegistryError,
};
