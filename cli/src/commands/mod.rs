pub mod aggregate;
pub mod init;
pub mod run;
pub mod validate;

pub use aggregate::AggregateArgs;
pub use init::InitArgs;
pub use run::{PassSelection, RunArgs};
pub use validate::ValidateArgs;
