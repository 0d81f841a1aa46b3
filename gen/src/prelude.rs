use crate::tables::BTable;
use crate::tables::DTable;
pub type CompiledTableB = crate::CompiledTable<BTable>;
pub type CompiledTableD = crate::CompiledTable<DTable>;
pub use crate::CompiledTable;
pub use crate::Fxy;
pub use crate::TableType;
pub use crate::tables::{BTableEntry, DTableEntry};
