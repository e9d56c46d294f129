use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use yatagarasu_foundation::DispatchError;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Shell-style command line, tokenized with `shell-words` rather than
    /// handed to a shell. No command substitution, no globbing.
    pub command: String,
    pub timeout_sec: f64,
    /// Exposed to the dispatched command as `YATAGARASU_CWD`.
    pub cwd: PathBuf,
}

/// Invokes the configured external command with the dispatched session text
/// on stdin. Failures are logged by the caller, never propagated as fatal.
pub struct Dispatcher {
    cfg: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self { cfg }
    }

    pub async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        let tokens = shell_words::split(&self.cfg.command)
            .map_err(|e| DispatchError::Tokenize(e.to_string()))?;
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| DispatchError::Tokenize("empty dispatch command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env("YATAGARASU_CWD", &self.cfg.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        let total = Duration::from_secs_f64(self.cfg.timeout_sec.max(0.0));
        let write_budget = total / 2;
        let wait_budget = total.saturating_sub(write_budget);

        if let Some(mut stdin) = child.stdin.take() {
            match tokio::time::timeout(write_budget, stdin.write_all(text.as_bytes())).await {
                Ok(Ok(())) => drop(stdin),
                Ok(Err(e)) => return Err(DispatchError::Spawn(e.to_string())),
                Err(_) => return Err(DispatchError::Timeout(total)),
            }
        }

        match tokio::time::timeout(wait_budget, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DispatchError::NonZeroExit(status.code().unwrap_or(-1))),
            Ok(Err(e)) => Err(DispatchError::Spawn(e.to_string())),
            Err(_) => Err(DispatchError::Timeout(total)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(command: &str) -> DispatcherConfig {
        DispatcherConfig {
            command: command.to_string(),
            timeout_sec: 5.0,
            cwd: PathBuf::from("/tmp"),
        }
    }

    #[tokio::test]
    async fn dispatches_text_to_stdin_consumer() {
        let dispatcher = Dispatcher::new(cfg("cat"));
        let result = dispatcher.dispatch("hello world").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn empty_command_is_a_tokenize_error() {
        let dispatcher = Dispatcher::new(cfg("   "));
        let err = dispatcher.dispatch("text").await.unwrap_err();
        assert!(matches!(err, DispatchError::Tokenize(_)));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let dispatcher = Dispatcher::new(cfg("sh -c 'cat >/dev/null; exit 3'"));
        let err = dispatcher.dispatch("text").await.unwrap_err();
        assert!(matches!(err, DispatchError::NonZeroExit(3)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dispatcher = Dispatcher::new(cfg("yatagarasu-definitely-not-a-real-binary"));
        let err = dispatcher.dispatch("text").await.unwrap_err();
        assert!(matches!(err, DispatchError::Spawn(_)));
    }
}
