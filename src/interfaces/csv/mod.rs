//! CSV input and output for the command-line caller.

pub mod account_writer;
pub mod operation_reader;

pub use account_writer::AccountWriter;
pub use operation_reader::{Operation, OperationReader};
