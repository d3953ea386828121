pub mod memory;
pub mod records;
pub mod types;

pub use memory::MemoryMetaStore;
pub use records::RecordStore;
pub use types::MetaStore;
