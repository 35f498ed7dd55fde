pub mod algorithm;
pub mod claims;
pub mod codec;
pub mod container;
pub mod keystore;
pub mod pool;
pub mod primitive;

pub use algorithm::AlgorithmId;
pub use claims::{CLAIMS_SCHEMA, Claims};
pub use codec::TokenCodec;
pub use container::ContainerBuilder;
pub use keystore::{KeyEntry, KeyMaterialStore};
pub use pool::PerThreadCodecPool;
pub use primitive::CryptoPrimitive;
