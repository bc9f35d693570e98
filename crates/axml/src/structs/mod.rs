pub mod chunk;
pub mod config;
pub mod string_pool;
pub mod table;
pub mod value;
pub mod xml;

pub use chunk::*;
pub use config::*;
pub use string_pool::*;
pub use table::*;
pub use value::*;
pub use xml::*;
