pub mod registry;

pub use registry::{Invoker, ToolRegistry};
