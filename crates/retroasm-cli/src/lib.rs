pub mod model;
pub mod program;

// Re-export commonly used types/functions for the binaries
pub use model::{is_mapped, load_raw_bin, Image, Segment};
pub use program::{assemble_source, Line, Program};
