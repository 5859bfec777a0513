//! Host shell invocation.

use tokio::process::Command;

/// Build a command that runs `command` through the platform shell.
#[cfg(windows)]
pub fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Build a command that runs `command` through the platform shell.
#[cfg(not(windows))]
pub fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_posix_shape() {
        let cmd = shell_command("echo hi");
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "sh");
        assert_eq!(
            std_cmd.get_args().collect::<Vec<_>>(),
            vec!["-c", "echo hi"]
        );
    }
}
