use async_trait::async_trait;
use tokio::process::Command;

use super::traits::Restarter;
use super::HealthError;

/// Restarts a collaborator by running an external command (a service
/// manager call, a launcher script). Exit status 0 is success.
///
/// The supervisor timeboxes each call; the child is killed if the call is
/// abandoned.
#[derive(Debug, Clone)]
pub struct CommandRestarter {
    program: String,
    args: Vec<String>,
}

impl CommandRestarter {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Restarter for CommandRestarter {
    async fn restart(&self, reason: &str) -> Result<(), HealthError> {
        tracing::info!(program = %self.program, reason, "Running restart command");
        let status = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| HealthError::RestartFailed(format!("{}: {e}", self.program)))?;
        if status.success() {
            Ok(())
        } else {
            Err(HealthError::RestartFailed(format!("{} exited with {status}", self.program)))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exit_status_decides_outcome() {
        assert!(CommandRestarter::new("true", Vec::<String>::new())
            .restart("test")
            .await
            .is_ok());
        assert!(matches!(
            CommandRestarter::new("false", Vec::<String>::new()).restart("test").await,
            Err(HealthError::RestartFailed(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_failure() {
        let restarter = CommandRestarter::new("/nonexistent/restart-me", ["--now"]);
        assert!(matches!(
            restarter.restart("test").await,
            Err(HealthError::RestartFailed(_))
        ));
    }
}
