use log::debug;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

use crate::error::LaunchError;

/// Command execution context
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Name of the command for logging
    pub command_name: Option<String>,
    /// Current working directory
    pub working_dir: Option<PathBuf>,
    /// Whether to create a process group
    pub process_group: bool,
    /// Capture output
    pub capture_output: bool,
}

/// Builder for CommandExecutor
pub struct CommandExecutorBuilder {
    context: CommandContext,
}

impl Default for CommandExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutorBuilder {
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Set whether to pipe stdout/stderr back to us
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.context.capture_output = capture;
        self
    }

    /// Set the working directory
    pub fn working_dir<P: AsRef<Path>>(mut self, dir: Option<P>) -> Self {
        self.context.working_dir = dir.map(|d| d.as_ref().to_path_buf());
        self
    }

    /// Put the child in its own process group so it can be signalled as a unit
    pub fn process_group(mut self, create_group: bool) -> Self {
        self.context.process_group = create_group;
        self
    }

    /// Set a name for the command for logging purposes
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.context.command_name = Some(name.into());
        self
    }

    pub fn build(self) -> CommandExecutor {
        CommandExecutor {
            context: self.context,
        }
    }
}

/// Spawns child processes with a fixed context
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    context: CommandContext,
}

impl CommandExecutor {
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    /// Execute a command with arguments and wait for it to complete, returning the output.
    /// A non-zero exit is not an error here; callers inspect `Output::status`.
    pub fn execute_command_with_args(
        &self,
        cmd: &str,
        args: &[&str],
    ) -> Result<Output, LaunchError> {
        let child = self.launch_command(cmd, args)?;
        child
            .wait_with_output()
            .map_err(|source| LaunchError::Wait { source })
    }

    /// Launch a command, returning the child process handle
    pub fn launch_command(&self, cmd: &str, args: &[&str]) -> Result<Child, LaunchError> {
        let command_str = self.format_command(cmd, args);
        debug!("Launching command: {}", command_str);

        let mut command = Command::new(cmd);
        command.args(args).stdin(Stdio::null());

        if let Some(dir) = &self.context.working_dir {
            command.current_dir(dir);
        }

        if self.context.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        if self.context.process_group {
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| LaunchError::SpawnFailed {
            command: command_str.clone(),
            source,
        })?;
        debug!("Spawned '{}' with pid {}", command_str, child.id());

        Ok(child)
    }

    /// Format command and arguments for logging
    fn format_command(&self, cmd: &str, args: &[&str]) -> String {
        if let Some(name) = &self.context.command_name {
            return name.clone();
        }

        format!("{} {}", cmd, args.join(" ")).trim_end().to_string()
    }
}
