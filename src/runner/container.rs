// src/runner/container.rs

//! Command-line construction for container-backed contexts.
//!
//! One function per provider builds the runtime argument list; the env is
//! inlined with `-e KEY=VALUE` for docker/podman/compose and prefixed to
//! the in-container command for kubectl.

use std::path::Path;

use indexmap::IndexMap;

use crate::runner::context::Binary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerProvider {
    Docker,
    Podman,
    DockerCompose,
    Kubectl,
}

impl ContainerProvider {
    pub fn default_bin(&self) -> &'static str {
        match self {
            ContainerProvider::Docker => "docker",
            ContainerProvider::Podman => "podman",
            ContainerProvider::DockerCompose => "docker-compose",
            ContainerProvider::Kubectl => "kubectl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "docker" => Some(ContainerProvider::Docker),
            "podman" => Some(ContainerProvider::Podman),
            "docker-compose" => Some(ContainerProvider::DockerCompose),
            "kubectl" => Some(ContainerProvider::Kubectl),
            _ => None,
        }
    }
}

/// Container-specific context configuration.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub provider: ContainerProvider,
    /// Container (exec) or service (compose) name.
    pub name: Option<String>,
    /// Image to run when `exec` is false.
    pub image: Option<String>,
    /// `exec` into a running container instead of `run --rm`.
    pub exec: bool,
    /// Extra runtime options, passed through verbatim.
    pub options: Vec<String>,
    /// Env inlined into the runtime invocation.
    pub env: IndexMap<String, String>,
    /// Override for the runtime binary.
    pub bin: Option<String>,
    /// Shell used inside the container; defaults to `sh -c`.
    pub shell: Option<Binary>,
    pub entrypoint: Option<String>,
}

impl ContainerConfig {
    pub fn new(provider: ContainerProvider) -> Self {
        Self {
            provider,
            name: None,
            image: None,
            exec: false,
            options: Vec::new(),
            env: IndexMap::new(),
            bin: None,
            shell: None,
            entrypoint: None,
        }
    }

    fn runtime_bin(&self) -> String {
        self.bin
            .clone()
            .unwrap_or_else(|| self.provider.default_bin().to_string())
    }

    fn shell(&self) -> Binary {
        self.shell
            .clone()
            .unwrap_or_else(|| Binary::new("sh", vec!["-c".into()]))
    }
}

/// Build the full command prefix (runtime + subcommand + options + shell)
/// for one command invocation.
pub fn build_command_args(cfg: &ContainerConfig, envfile_path: Option<&Path>) -> Vec<String> {
    let (envfile_args, options) = place_env_file(cfg, envfile_path);
    let mut args = vec![cfg.runtime_bin()];

    match cfg.provider {
        ContainerProvider::Docker | ContainerProvider::Podman => {
            if cfg.exec {
                args.push("exec".into());
            } else {
                args.push("run".into());
                args.push("--rm".into());
            }
            args.extend(envfile_args);
            if !cfg.exec {
                if let Some(name) = &cfg.name {
                    args.push("--name".into());
                    args.push(name.clone());
                }
                if let Some(entrypoint) = &cfg.entrypoint {
                    args.push("--entrypoint".into());
                    args.push(entrypoint.clone());
                }
            }
            for (k, v) in &cfg.env {
                args.push("-e".into());
                args.push(format!("{k}={v}"));
            }
            args.extend(options);
            if cfg.exec {
                args.extend(cfg.name.iter().cloned());
            } else {
                args.extend(cfg.image.iter().cloned());
            }
        }
        ContainerProvider::DockerCompose => {
            if cfg.exec {
                args.push("exec".into());
                args.push("-T".into());
            } else {
                args.push("run".into());
                args.push("--rm".into());
            }
            args.extend(envfile_args);
            args.extend(options);
            for (k, v) in &cfg.env {
                args.push("-e".into());
                args.push(format!("{k}={v}"));
            }
            args.extend(cfg.name.iter().cloned());
        }
        ContainerProvider::Kubectl => {
            args.push("exec".into());
            args.extend(cfg.name.iter().cloned());
            args.extend(options);
            args.push("--".into());
        }
    }

    let shell = cfg.shell();
    args.push(shell.bin);
    args.extend(shell.args);
    args
}

/// The command as seen inside the container. For kubectl the env cannot be
/// passed as runtime flags, so it is prefixed onto the command itself.
pub fn wrap_command(cfg: &ContainerConfig, command: &str) -> String {
    if cfg.provider == ContainerProvider::Kubectl && !cfg.env.is_empty() {
        let env_prefix: Vec<String> = cfg.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{} {command}", env_prefix.join(" "))
    } else {
        command.to_string()
    }
}

/// Work out where `--env-file <path>` goes.
///
/// If the user options already carry `--env-file`, its value is overwritten
/// in place (the user's position is preserved); otherwise the flag lands
/// right after the subcommand. Kubectl has no envfile support, so the flag
/// is never produced for it.
///
/// Returns `(args after the subcommand, effective user options)`.
fn place_env_file(cfg: &ContainerConfig, envfile_path: Option<&Path>) -> (Vec<String>, Vec<String>) {
    let mut options = cfg.options.clone();
    let Some(path) = envfile_path else {
        return (Vec::new(), options);
    };
    if cfg.provider == ContainerProvider::Kubectl {
        return (Vec::new(), options);
    }
    let path = path.display().to_string();

    if let Some(idx) = options.iter().position(|o| o == "--env-file") {
        if idx + 1 < options.len() {
            options[idx + 1] = path;
        } else {
            options.push(path);
        }
        return (Vec::new(), options);
    }

    (vec!["--env-file".into(), path], options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker_exec() -> ContainerConfig {
        let mut cfg = ContainerConfig::new(ContainerProvider::Docker);
        cfg.exec = true;
        cfg.name = Some("app".into());
        cfg.env.insert("FOO".into(), "bar".into());
        cfg
    }

    #[test]
    fn docker_exec_inlines_env_and_name() {
        let args = build_command_args(&docker_exec(), None);
        assert_eq!(
            args,
            vec!["docker", "exec", "-e", "FOO=bar", "app", "sh", "-c"]
        );
    }

    #[test]
    fn docker_run_uses_rm_and_image() {
        let mut cfg = ContainerConfig::new(ContainerProvider::Docker);
        cfg.image = Some("alpine:latest".into());
        let args = build_command_args(&cfg, None);
        assert_eq!(args, vec!["docker", "run", "--rm", "alpine:latest", "sh", "-c"]);
    }

    #[test]
    fn envfile_is_injected_after_the_subcommand() {
        let mut cfg = ContainerConfig::new(ContainerProvider::Docker);
        cfg.image = Some("alpine".into());
        let args = build_command_args(&cfg, Some(Path::new(".taskctl/x.env")));
        assert_eq!(
            args,
            vec![
                "docker",
                "run",
                "--rm",
                "--env-file",
                ".taskctl/x.env",
                "alpine",
                "sh",
                "-c"
            ]
        );
    }

    #[test]
    fn compose_exec_disables_tty() {
        let mut cfg = ContainerConfig::new(ContainerProvider::DockerCompose);
        cfg.exec = true;
        cfg.name = Some("web".into());
        let args = build_command_args(&cfg, None);
        assert_eq!(args, vec!["docker-compose", "exec", "-T", "web", "sh", "-c"]);
    }

    #[test]
    fn kubectl_prefixes_env_onto_the_command() {
        let mut cfg = ContainerConfig::new(ContainerProvider::Kubectl);
        cfg.name = Some("pod-0".into());
        cfg.env.insert("FOO".into(), "bar".into());

        let args = build_command_args(&cfg, None);
        assert_eq!(args, vec!["kubectl", "exec", "pod-0", "--", "sh", "-c"]);
        assert_eq!(wrap_command(&cfg, "env"), "FOO=bar env");
    }

    #[test]
    fn existing_env_file_option_is_overwritten() {
        let mut cfg = ContainerConfig::new(ContainerProvider::Docker);
        cfg.image = Some("alpine".into());
        cfg.options = vec!["--env-file".into(), "stale.env".into()];
        let args = build_command_args(&cfg, Some(Path::new("fresh.env")));
        assert!(args.windows(2).any(|w| w == ["--env-file", "fresh.env"]));
        assert!(!args.contains(&"stale.env".to_string()));
    }
}
