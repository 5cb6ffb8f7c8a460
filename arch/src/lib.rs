pub mod inst;
pub mod operand;
pub mod reg;
pub mod table;

pub use inst::{EncodeError, Format};
pub use operand::{Mode, Operand};
pub use reg::{Reg, SysReg};
pub use table::{Entry, Table, TableError, TABLE};
