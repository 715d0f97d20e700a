// src/runner/remote.rs

//! Command-line construction for remote (ssh) contexts.

use crate::runner::context::Binary;

/// Remote context configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub user: Option<String>,
    pub host: String,
    /// Override for the ssh binary.
    pub bin: Option<String>,
    /// Extra ssh options (`-p`, `-i`, ...), passed through verbatim.
    pub options: Vec<String>,
}

/// Build the effective executable for a remote context:
/// `ssh [options] -T [user@]host [inner executable...]`.
///
/// `inner` is the executable the context runs the command through on the
/// remote side (e.g. `bash -c`); when absent the command is passed to the
/// remote login shell as-is.
pub fn build_executable(cfg: &SshConfig, inner: Option<&Binary>) -> Binary {
    let bin = cfg.bin.clone().unwrap_or_else(|| "ssh".to_string());

    let mut args = cfg.options.clone();
    args.push("-T".into());
    args.push(match &cfg.user {
        Some(user) => format!("{user}@{}", cfg.host),
        None => cfg.host.clone(),
    });

    if let Some(inner) = inner {
        args.push(inner.bin.clone());
        args.extend(inner.args.iter().cloned());
    }

    Binary::new(bin, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ssh_command_with_user_and_options() {
        let cfg = SshConfig {
            user: Some("deploy".into()),
            host: "build01".into(),
            bin: None,
            options: vec!["-p".into(), "2222".into()],
        };
        let binary = build_executable(&cfg, None);
        assert_eq!(binary.bin, "ssh");
        assert_eq!(binary.args, vec!["-p", "2222", "-T", "deploy@build01"]);
    }

    #[test]
    fn host_without_user_and_inner_executable() {
        let cfg = SshConfig {
            user: None,
            host: "build01".into(),
            bin: None,
            options: Vec::new(),
        };
        let inner = Binary::new("bash", vec!["-c".into()]);
        let binary = build_executable(&cfg, Some(&inner));
        assert_eq!(binary.args, vec!["-T", "build01", "bash", "-c"]);
    }
}
