pub mod driver;
pub mod error;
pub mod location;
pub mod node;
pub mod runq;

pub use driver::{Driver, DriverFactory, DriverRegistry};
pub use error::{BuildError, CompileError, DriverError, PlanError};
pub use location::Location;
pub use node::{FuncNode, NodeId};
pub use runq::{Chain, RunQ};

/// Parse flowl source and build its plan.
pub fn compile(source: &str, file_id: usize, drivers: &DriverRegistry) -> Result<RunQ, CompileError> {
    let ast = flowl::parse(source, file_id)?;
    let q = RunQ::new(ast, drivers)?;
    Ok(q)
}
