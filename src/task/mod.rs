pub mod clock;
pub mod error;
pub mod heap;
pub mod manager;
pub mod profiler;
pub mod status;
pub mod types;


pub use clock::*;
pub use error::*;
pub use heap::*;
pub use manager::*;
pub use profiler::*;
pub use status::*;
pub use types::*;
