mod args;

pub use args::{Args, Command, ConnectionArgs, FailureSeverity, OutputFormat, SelectionArgs};
