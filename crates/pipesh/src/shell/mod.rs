// Copyright 2018-2024 the Deno authors. MIT license.

pub use commands::parse_arg_kinds;
pub use commands::ArgKind;
pub use commands::ShellCommand;
pub use commands::ShellCommandContext;
pub use execute::execute;
pub use execute::execute_with_pipes;
pub use types::pipe;
pub use types::EnvChange;
pub use types::ExecuteResult;
pub use types::ShellPipeReader;
pub use types::ShellPipeWriter;
pub use types::ShellState;
pub use types::COMMAND_NOT_FOUND_EXIT_CODE;
pub use types::PERMISSION_DENIED_EXIT_CODE;

mod commands;
mod execute;
mod types;
