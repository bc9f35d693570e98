pub mod central_directory;
pub mod eocd;
pub mod local_file_header;

pub use central_directory::*;
pub use eocd::*;
pub use local_file_header::*;
