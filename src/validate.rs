//! Pre-flight validation
//!
//! Turns a raw `InputModel` into a fully-resolved, execution-ready one, or
//! ends the run: fatal errors for impossible requests, graceful stops for
//! "nothing to do" cases (empty source, refused overwrite). Every remote
//! entity named on the command line is verified to exist before any data
//! moves.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::Path;

use crate::input::{InputModel, Role, DEFAULT_NAMESPACE};
use crate::kube::KubeClient;
use crate::prompt::Prompt;

/// Tools every endpoint container must carry: archiver, lister, remover.
pub const REQUIRED_TOOLS: &[&str] = &["tar", "ls", "rm"];

/// How a control-flow stage ends: keep going, or stop here with a message
/// and a successful exit. A `Stop` is a guarded no-op, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Proceed,
    Stop(String),
}

pub struct Validator<'a> {
    client: &'a dyn KubeClient,
    prompt: &'a mut dyn Prompt,
}

impl<'a> Validator<'a> {
    pub fn new(client: &'a dyn KubeClient, prompt: &'a mut dyn Prompt) -> Self {
        Validator { client, prompt }
    }

    pub fn validate(&mut self, input: &mut InputModel) -> Result<Outcome> {
        if input.download_only && input.upload_only {
            bail!("--download-only and --upload-only are mutually exclusive");
        }

        if input.upload_only {
            verify_local_archive(&input.local_file)?;
        } else if let Outcome::Stop(msg) = self.validate_endpoint(input, Role::Source)? {
            return Ok(Outcome::Stop(msg));
        }

        if !input.download_only {
            if let Outcome::Stop(msg) = self.validate_endpoint(input, Role::Destination)? {
                return Ok(Outcome::Stop(msg));
            }
            if let Outcome::Stop(msg) = self.guard_destination_overwrite(input)? {
                return Ok(Outcome::Stop(msg));
            }
        }

        input.resolve_keep_local();
        Ok(Outcome::Proceed)
    }

    /// Steps 1-8 of the per-endpoint pass: required fields, context and
    /// namespace defaults, existence checks, container disambiguation,
    /// tool dependencies, and the empty-source short circuit.
    fn validate_endpoint(&mut self, input: &mut InputModel, role: Role) -> Result<Outcome> {
        let interactive = input.interactive;
        let prefix = role.flag_prefix();
        let ep = input.endpoint_mut(role);

        if ep.pod.is_empty() {
            bail!("--{}-pod is required", prefix);
        }
        if ep.dir.is_empty() {
            bail!("--{}-dir is required", prefix);
        }

        if ep.context.is_empty() {
            ep.context = self.client.current_context()?;
        } else if !self.client.context_exists(&ep.context)? {
            bail!("context '{}' doesn't exist", ep.context);
        }

        if ep.namespace.is_empty() {
            let configured = self.client.default_namespace(&ep.context)?;
            ep.namespace = if configured.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                configured
            };
        } else if !self.client.namespace_exists(&ep.context, &ep.namespace)? {
            bail!(
                "namespace '{}' doesn't exist in context '{}'",
                ep.namespace,
                ep.context
            );
        }

        if !self.client.pod_exists(&ep.context, &ep.namespace, &ep.pod)? {
            bail!(
                "pod '{}' doesn't exist in namespace '{}' of context '{}'",
                ep.pod,
                ep.namespace,
                ep.context
            );
        }

        if ep.container.is_empty() {
            let containers = self
                .client
                .list_containers(&ep.context, &ep.namespace, &ep.pod)?;
            ep.container = match containers.as_slice() {
                [] => bail!("pod '{}' reports no containers", ep.pod),
                [only] => only.clone(),
                _ if interactive => {
                    let title = format!(
                        "Pod '{}' has several containers; pick the {} one:",
                        ep.pod,
                        role.label()
                    );
                    let idx = self.prompt.select(&title, &containers)?;
                    containers[idx].clone()
                }
                _ => bail!(
                    "pod '{}' has several containers ({}); pass --{}-container",
                    ep.pod,
                    containers.join(", "),
                    prefix
                ),
            };
        } else if !self.client.container_exists(&ep.context, &ep.namespace, &ep.pod, &ep.container)? {
            bail!(
                "container '{}' doesn't exist in pod '{}'",
                ep.container,
                ep.pod
            );
        }

        self.client.check_tools(ep.target(), REQUIRED_TOOLS)?;

        if !self.client.dir_exists(ep.target(), &ep.dir)? {
            bail!(
                "directory '{}' doesn't exist in container '{}' of pod '{}'",
                ep.dir,
                ep.container,
                ep.pod
            );
        }

        if role == Role::Source && self.client.dir_entry_count(ep.target(), &ep.dir)? == 0 {
            return Ok(Outcome::Stop(format!(
                "source directory '{}' in pod '{}' is empty; nothing to transfer",
                ep.dir, ep.pod
            )));
        }

        Ok(Outcome::Proceed)
    }

    /// The destructive-operation guard: a non-empty destination is only
    /// replaced with explicit consent, asked for interactively or given
    /// up front via --overwrite-dst.
    fn guard_destination_overwrite(&mut self, input: &mut InputModel) -> Result<Outcome> {
        if input.overwrite_dst == Some(true) {
            return Ok(Outcome::Proceed);
        }

        let ep = &input.dst;
        let entries = self.client.dir_entry_count(ep.target(), &ep.dir)?;
        if entries == 0 {
            return Ok(Outcome::Proceed);
        }

        if input.interactive && input.overwrite_dst.is_none() {
            let question = format!(
                "destination directory '{}' in pod '{}' has {} entries; overwrite?",
                ep.dir, ep.pod, entries
            );
            let answer = self.prompt.confirm(&question, false)?;
            input.overwrite_dst = Some(answer);
            if answer {
                Ok(Outcome::Proceed)
            } else {
                Ok(Outcome::Stop(
                    "not overwriting destination; nothing transferred".to_string(),
                ))
            }
        } else if input.overwrite_dst.is_none() {
            Ok(Outcome::Stop(format!(
                "destination directory '{}' in pod '{}' is not empty; pass --overwrite-dst true to replace its contents",
                ep.dir, ep.pod
            )))
        } else {
            Ok(Outcome::Stop(format!(
                "destination directory '{}' in pod '{}' is not empty and overwriting is disabled; nothing transferred",
                ep.dir, ep.pod
            )))
        }
    }
}

/// Upload-only runs skip the source pass; the staging archive they would
/// have produced must already exist and be a readable gzip tar stream.
fn verify_local_archive(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("local file '{}' doesn't exist", path.display());
    }
    let file = File::open(path)
        .with_context(|| format!("opening local file '{}'", path.display()))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut entries = archive
        .entries()
        .with_context(|| format!("'{}' is not a readable archive", path.display()))?;
    if let Some(entry) = entries.next() {
        entry.with_context(|| {
            format!("'{}' is not a valid gzip-compressed archive", path.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Endpoint;
    use crate::kube::fake::FakeClient;
    use crate::prompt::scripted::ScriptedPrompt;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::path::PathBuf;

    /// Two single-container pods in the default namespace: a populated
    /// source directory and an empty destination directory.
    fn world() -> FakeClient {
        FakeClient::new()
            .with_pod("minikube", "default", "old", &["web"])
            .with_pod("minikube", "default", "new", &["web"])
            .with_dir("minikube", "default", "old", "web", "/data", 3)
            .with_dir("minikube", "default", "new", "web", "/data", 0)
    }

    fn full_input() -> InputModel {
        InputModel {
            src: Endpoint {
                pod: "old".to_string(),
                dir: "/data".to_string(),
                ..Endpoint::default()
            },
            dst: Endpoint {
                pod: "new".to_string(),
                dir: "/data".to_string(),
                ..Endpoint::default()
            },
            ..InputModel::default()
        }
    }

    fn validate(
        client: &FakeClient,
        prompt: &mut ScriptedPrompt,
        input: &mut InputModel,
    ) -> Result<Outcome> {
        Validator::new(client, prompt).validate(input)
    }

    #[test]
    fn modes_are_mutually_exclusive_before_any_remote_call() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = InputModel {
            download_only: true,
            upload_only: true,
            ..full_input()
        };
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("mutually exclusive"));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn missing_pod_and_dir_name_the_flag() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();

        let mut input = full_input();
        input.src.pod.clear();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("--src-pod"));

        let mut input = full_input();
        input.dst.dir.clear();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("--dst-dir"));
    }

    #[test]
    fn unset_context_and_namespace_resolve_to_defaults() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(outcome, Outcome::Proceed);
        assert_eq!(input.src.context, "minikube");
        // No namespace configured on the context: the literal default wins.
        assert_eq!(input.src.namespace, "default");
        assert_eq!(input.dst.context, "minikube");
    }

    #[test]
    fn configured_context_namespace_is_preferred_over_literal_default() {
        let mut client = FakeClient::new()
            .with_pod("minikube", "apps", "old", &["web"])
            .with_pod("minikube", "apps", "new", &["web"])
            .with_dir("minikube", "apps", "old", "web", "/data", 3)
            .with_dir("minikube", "apps", "new", "web", "/data", 0);
        client
            .default_namespaces
            .insert("minikube".to_string(), "apps".to_string());
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(outcome, Outcome::Proceed);
        assert_eq!(input.src.namespace, "apps");
        assert_eq!(input.dst.namespace, "apps");
    }

    #[test]
    fn explicit_context_must_exist() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.src.context = "prod".to_string();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("context 'prod'"));
    }

    #[test]
    fn explicit_namespace_must_exist() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.src.namespace = "staging".to_string();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("namespace 'staging'"));
    }

    #[test]
    fn pod_must_exist() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.src.pod = "gone".to_string();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("pod 'gone'"));
    }

    #[test]
    fn explicit_container_must_exist() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.src.container = "sidecar".to_string();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("container 'sidecar'"));
    }

    #[test]
    fn single_container_resolves_without_prompt() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(input.src.container, "web");
        assert!(prompt.asked.is_empty());
        let listings = client
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("list_containers") && c.ends_with("old"))
            .count();
        assert_eq!(listings, 1);
    }

    #[test]
    fn multi_container_interactive_uses_the_selection() {
        let client = world().with_pod("minikube", "default", "old", &["web", "sidecar"]);
        let client = client.with_dir("minikube", "default", "old", "sidecar", "/data", 3);
        let mut prompt = ScriptedPrompt::with_selects(&[1]);
        let mut input = full_input();
        validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(input.src.container, "sidecar");
        assert_eq!(prompt.asked.len(), 1);
    }

    #[test]
    fn multi_container_non_interactive_names_all_candidates() {
        let client = world().with_pod("minikube", "default", "old", &["web", "sidecar"]);
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.interactive = false;
        input.overwrite_dst = Some(true);
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        let msg = err.to_string();
        assert!(msg.contains("web, sidecar"));
        assert!(msg.contains("--src-container"));
    }

    #[test]
    fn missing_remote_tool_is_named() {
        let mut client = world();
        client.missing_tool = Some("tar".to_string());
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("'tar' not found"));
    }

    #[test]
    fn directory_must_exist() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.src.dir = "/missing".to_string();
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("directory '/missing'"));
    }

    #[test]
    fn empty_source_directory_stops_gracefully() {
        let client = world().with_dir("minikube", "default", "old", "web", "/data", 0);
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        match outcome {
            Outcome::Stop(msg) => assert!(msg.contains("empty")),
            Outcome::Proceed => panic!("expected a graceful stop"),
        }
        assert!(client.transfer_calls().is_empty());
    }

    #[test]
    fn explicit_overwrite_skips_the_destination_entry_count() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.overwrite_dst = Some(true);
        validate(&client, &mut prompt, &mut input).expect("validation");
        assert!(!client
            .calls()
            .iter()
            .any(|c| c.starts_with("dir_entry_count new")));
    }

    #[test]
    fn nonempty_destination_interactive_decline_stops() {
        let client = world().with_dir("minikube", "default", "new", "web", "/data", 2);
        let mut prompt = ScriptedPrompt::with_confirms(&[false]);
        let mut input = full_input();
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert!(matches!(outcome, Outcome::Stop(_)));
        assert_eq!(input.overwrite_dst, Some(false));
    }

    #[test]
    fn nonempty_destination_interactive_accept_proceeds() {
        let client = world().with_dir("minikube", "default", "new", "web", "/data", 2);
        let mut prompt = ScriptedPrompt::with_confirms(&[true]);
        let mut input = full_input();
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(outcome, Outcome::Proceed);
        assert_eq!(input.overwrite_dst, Some(true));
    }

    #[test]
    fn nonempty_destination_non_interactive_unset_stops_pointing_at_flag() {
        let client = world().with_dir("minikube", "default", "new", "web", "/data", 2);
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.interactive = false;
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        match outcome {
            Outcome::Stop(msg) => assert!(msg.contains("--overwrite-dst")),
            Outcome::Proceed => panic!("expected a graceful stop"),
        }
        assert!(client.transfer_calls().is_empty());
    }

    #[test]
    fn nonempty_destination_explicit_false_stops() {
        let client = world().with_dir("minikube", "default", "new", "web", "/data", 2);
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.overwrite_dst = Some(false);
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert!(matches!(outcome, Outcome::Stop(_)));
    }

    fn write_archive(path: &std::path::Path) {
        let file = File::create(path).expect("create archive");
        let enc = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(enc);
        let data = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "hello.txt", &data[..])
            .expect("append");
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip");
    }

    #[test]
    fn upload_only_missing_archive_fails_before_any_remote_call() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.upload_only = true;
        input.local_file = PathBuf::from("/nonexistent/missing.tar.gz");
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("doesn't exist"));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn upload_only_rejects_a_file_that_is_not_gzip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bogus.tar.gz");
        std::fs::write(&path, b"plainly not an archive").expect("write");
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.upload_only = true;
        input.local_file = path;
        let err = validate(&client, &mut prompt, &mut input).expect_err("must fail");
        assert!(err.to_string().contains("not a valid gzip"));
    }

    #[test]
    fn upload_only_accepts_a_real_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("backup.tar.gz");
        write_archive(&path);
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        input.upload_only = true;
        input.local_file = path;
        let outcome = validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(outcome, Outcome::Proceed);
        assert_eq!(input.keep_local, Some(true));
    }

    #[test]
    fn validation_is_idempotent_for_unchanged_remote_state() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        validate(&client, &mut prompt, &mut input).expect("first pass");
        let first = input.clone();
        validate(&client, &mut prompt, &mut input).expect("second pass");
        assert_eq!(input, first);
    }

    #[test]
    fn keep_local_is_resolved_by_validation() {
        let client = world();
        let mut prompt = ScriptedPrompt::new();
        let mut input = full_input();
        validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(input.keep_local, Some(false));

        let mut input = InputModel {
            download_only: true,
            ..full_input()
        };
        validate(&client, &mut prompt, &mut input).expect("validation");
        assert_eq!(input.keep_local, Some(true));
    }
}
