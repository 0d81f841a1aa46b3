pub mod block;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod descriptor;
pub mod errors;
pub mod message;
pub mod opcodes;
pub mod parser;
pub mod structs;
pub mod table_path;
pub mod tables;

pub use crate::block::{Origin, RawMessage, ReportFile};
pub use crate::config::DecoderConfig;
pub use crate::decoder::Decoder;
pub use crate::errors::{Error, Result};
pub use crate::message::{Attribute, Encoding, Message, MessageHeader, Subset, Value, Variable};
pub use crate::parser::*;
pub use crate::table_path::{get_tables_base_path, set_tables_base_path};
pub use crate::tables::{
    CachedProvider, DescriptorTable, FileTableProvider, MemoryTableProvider, TableKey,
    TableProvider,
};
pub use crextables::Fxy;
