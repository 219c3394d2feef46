//! Cluster client boundary
//!
//! `KubeClient` is everything podcopy needs from the cluster: existence
//! checks, container listings, exec with streamed or discarded output, and
//! file copy into a container. The production implementation shells out to
//! `kubectl`; tests swap in a scripted fake.

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

/// Fully-addressed container for exec/copy operations.
#[derive(Debug, Clone, Copy)]
pub struct ExecTarget<'a> {
    pub context: &'a str,
    pub namespace: &'a str,
    pub pod: &'a str,
    pub container: &'a str,
}

impl crate::input::Endpoint {
    /// Borrow a resolved endpoint as an exec target.
    pub fn target(&self) -> ExecTarget<'_> {
        ExecTarget {
            context: &self.context,
            namespace: &self.namespace,
            pod: &self.pod,
            container: &self.container,
        }
    }
}

/// Read and exec operations against the cluster. Every method blocks for
/// the full remote round trip; failures are descriptive and fatal to the
/// invocation.
pub trait KubeClient {
    fn current_context(&self) -> Result<String>;
    fn context_exists(&self, context: &str) -> Result<bool>;
    /// Namespace configured on the context; empty if none.
    fn default_namespace(&self, context: &str) -> Result<String>;
    fn namespace_exists(&self, context: &str, namespace: &str) -> Result<bool>;
    fn pod_exists(&self, context: &str, namespace: &str, pod: &str) -> Result<bool>;
    /// Container names in platform order; at least one for a live pod.
    fn list_containers(&self, context: &str, namespace: &str, pod: &str) -> Result<Vec<String>>;
    fn container_exists(
        &self,
        context: &str,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<bool> {
        Ok(self
            .list_containers(context, namespace, pod)?
            .iter()
            .any(|c| c == container))
    }
    fn dir_exists(&self, target: ExecTarget<'_>, dir: &str) -> Result<bool>;
    fn dir_entry_count(&self, target: ExecTarget<'_>, dir: &str) -> Result<u64>;
    /// Fails naming the first tool not found in the container.
    fn check_tools(&self, target: ExecTarget<'_>, tools: &[&str]) -> Result<()>;
    /// Run `command` in the container, streaming its stdout into `sink`.
    fn exec_stream(
        &self,
        target: ExecTarget<'_>,
        command: &[&str],
        sink: &mut dyn Write,
    ) -> Result<()>;
    /// Run `command` in the container, discarding output.
    fn exec(&self, target: ExecTarget<'_>, command: &[&str]) -> Result<()>;
    /// Copy a local file into the container's filesystem.
    fn copy_in(&self, target: ExecTarget<'_>, local: &Path, remote: &str) -> Result<()>;
}

/// Scope flags shared by every pod-addressed kubectl invocation.
fn scope_args(context: &str, namespace: &str) -> Vec<String> {
    let mut args = Vec::new();
    if !context.is_empty() {
        args.push("--context".to_string());
        args.push(context.to_string());
    }
    if !namespace.is_empty() {
        args.push("--namespace".to_string());
        args.push(namespace.to_string());
    }
    args
}

fn base_args(context: &str, namespace: &str, trailing: &[&str]) -> Vec<String> {
    let mut args = scope_args(context, namespace);
    args.extend(trailing.iter().map(|s| s.to_string()));
    args
}

fn exec_args(target: ExecTarget<'_>, command: &[&str]) -> Vec<String> {
    let mut args = scope_args(target.context, target.namespace);
    args.push("exec".to_string());
    args.push(target.pod.to_string());
    args.push("--container".to_string());
    args.push(target.container.to_string());
    args.push("--".to_string());
    args.extend(command.iter().map(|s| s.to_string()));
    args
}

fn cp_args(target: ExecTarget<'_>, local: &Path, remote: &str) -> Vec<String> {
    let mut args = scope_args(target.context, target.namespace);
    args.push("cp".to_string());
    args.push(local.display().to_string());
    args.push(format!("{}:{}", target.pod, remote));
    args.push("--container".to_string());
    args.push(target.container.to_string());
    args
}

/// Production client driving the `kubectl` binary.
pub struct Kubectl {
    program: String,
}

impl Kubectl {
    pub fn new() -> Self {
        Kubectl {
            program: "kubectl".to_string(),
        }
    }

    fn run(&self, args: &[String]) -> Result<std::process::Output> {
        Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("failed to run '{}'; is it installed?", self.program))
    }

    /// Run and return trimmed stdout; non-zero exit is an error carrying
    /// kubectl's stderr.
    fn capture(&self, args: &[String]) -> Result<String> {
        let out = self.run(args)?;
        if !out.status.success() {
            bail!(
                "'{} {}' failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Run and report only whether the command succeeded.
    fn succeeds(&self, args: &[String]) -> Result<bool> {
        Ok(self.run(args)?.status.success())
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Kubectl::new()
    }
}

impl KubeClient for Kubectl {
    fn current_context(&self) -> Result<String> {
        self.capture(&base_args("", "", &["config", "current-context"]))
            .context("no current kubectl context; set one or pass --src-context/--dst-context")
    }

    fn context_exists(&self, context: &str) -> Result<bool> {
        self.succeeds(&base_args("", "", &["config", "get-contexts", context]))
    }

    fn default_namespace(&self, context: &str) -> Result<String> {
        let jsonpath = format!(
            "jsonpath={{.contexts[?(@.name==\"{}\")].context.namespace}}",
            context
        );
        self.capture(&base_args("", "", &["config", "view", "-o", &jsonpath]))
    }

    fn namespace_exists(&self, context: &str, namespace: &str) -> Result<bool> {
        self.succeeds(&base_args(context, "", &["get", "namespace", namespace]))
    }

    fn pod_exists(&self, context: &str, namespace: &str, pod: &str) -> Result<bool> {
        self.succeeds(&base_args(context, namespace, &["get", "pod", pod]))
    }

    fn list_containers(&self, context: &str, namespace: &str, pod: &str) -> Result<Vec<String>> {
        let names = self.capture(&base_args(
            context,
            namespace,
            &[
                "get",
                "pod",
                pod,
                "-o",
                "jsonpath={.spec.containers[*].name}",
            ],
        ))?;
        Ok(names.split_whitespace().map(str::to_string).collect())
    }

    fn dir_exists(&self, target: ExecTarget<'_>, dir: &str) -> Result<bool> {
        self.succeeds(&exec_args(target, &["test", "-d", dir]))
    }

    fn dir_entry_count(&self, target: ExecTarget<'_>, dir: &str) -> Result<u64> {
        let script = format!("ls -A '{}' | wc -l", dir);
        let out = self.capture(&exec_args(target, &["sh", "-c", &script]))?;
        out.trim()
            .parse()
            .with_context(|| format!("unexpected entry count '{}' for '{}'", out, dir))
    }

    fn check_tools(&self, target: ExecTarget<'_>, tools: &[&str]) -> Result<()> {
        for tool in tools {
            let script = format!("command -v {}", tool);
            if !self.succeeds(&exec_args(target, &["sh", "-c", &script]))? {
                bail!(
                    "'{}' not found in container '{}' of pod '{}'",
                    tool,
                    target.container,
                    target.pod
                );
            }
        }
        Ok(())
    }

    fn exec_stream(
        &self,
        target: ExecTarget<'_>,
        command: &[&str],
        sink: &mut dyn Write,
    ) -> Result<()> {
        let args = exec_args(target, command);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run '{}'; is it installed?", self.program))?;

        // Drain stdout into the sink before waiting so a large archive
        // cannot deadlock on a full pipe.
        let mut stdout = child
            .stdout
            .take()
            .context("no stdout pipe from kubectl exec")?;
        std::io::copy(&mut stdout, sink).context("streaming archive from container")?;

        let mut stderr_text = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text);
        }
        let status = child.wait().context("waiting for kubectl exec")?;
        if !status.success() {
            bail!(
                "'{} {}' failed: {}",
                self.program,
                args.join(" "),
                stderr_text.trim()
            );
        }
        Ok(())
    }

    fn exec(&self, target: ExecTarget<'_>, command: &[&str]) -> Result<()> {
        let args = exec_args(target, command);
        let out = self.run(&args)?;
        if !out.status.success() {
            bail!(
                "'{} {}' failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }

    fn copy_in(&self, target: ExecTarget<'_>, local: &Path, remote: &str) -> Result<()> {
        let args = cp_args(target, local, remote);
        let out = self.run(&args)?;
        if !out.status.success() {
            bail!(
                "'{} {}' failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ExecTarget<'static> {
        ExecTarget {
            context: "minikube",
            namespace: "apps",
            pod: "old",
            container: "web",
        }
    }

    #[test]
    fn scope_args_skip_empty_fields() {
        assert!(scope_args("", "").is_empty());
        let args = scope_args("minikube", "");
        assert_eq!(args, vec!["--context", "minikube"]);
        let args = scope_args("minikube", "apps");
        assert!(args.windows(2).any(|w| w == ["--namespace", "apps"]));
    }

    #[test]
    fn exec_args_address_the_container() {
        let args = exec_args(target(), &["test", "-d", "/data"]);
        assert!(args.windows(2).any(|w| w == ["--context", "minikube"]));
        assert!(args.windows(2).any(|w| w == ["exec", "old"]));
        assert!(args.windows(2).any(|w| w == ["--container", "web"]));
        assert!(args.ends_with(&[
            "--".to_string(),
            "test".to_string(),
            "-d".to_string(),
            "/data".to_string()
        ]));
    }

    #[test]
    fn cp_args_use_pod_colon_path_form() {
        let args = cp_args(target(), Path::new("archive.tar.gz"), "/tmp/archive.tar.gz");
        assert!(args
            .windows(2)
            .any(|w| w == ["archive.tar.gz", "old:/tmp/archive.tar.gz"]));
        assert!(args.windows(2).any(|w| w == ["--container", "web"]));
    }
}
