//! Resolved invocation configuration
//!
//! One `InputModel` per run: mutable while the validator fills in defaults
//! and verified values, read-only once the transfer starts.

use std::path::PathBuf;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_LOCAL_FILE: &str = "archive.tar.gz";

/// Which end of the transfer an endpoint describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Destination => "destination",
        }
    }

    /// CLI prefix for this endpoint's flags ("src" or "dst").
    pub fn flag_prefix(self) -> &'static str {
        match self {
            Role::Source => "src",
            Role::Destination => "dst",
        }
    }
}

/// One side of the transfer. Empty string means "not supplied"; validation
/// replaces every field of an active endpoint with a verified, non-empty
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub context: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputModel {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub interactive: bool,
    /// Unset means "ask (interactive) or refuse (non-interactive)".
    pub overwrite_dst: Option<bool>,
    /// Unset until `resolve_keep_local` runs at the end of validation.
    pub keep_local: Option<bool>,
    pub download_only: bool,
    pub upload_only: bool,
    pub dry_run: bool,
    pub local_file: PathBuf,
}

impl Default for InputModel {
    fn default() -> Self {
        InputModel {
            src: Endpoint::default(),
            dst: Endpoint::default(),
            interactive: true,
            overwrite_dst: None,
            keep_local: None,
            download_only: false,
            upload_only: false,
            dry_run: false,
            local_file: PathBuf::from(DEFAULT_LOCAL_FILE),
        }
    }
}

impl InputModel {
    pub fn endpoint_mut(&mut self, role: Role) -> &mut Endpoint {
        match role {
            Role::Source => &mut self.src,
            Role::Destination => &mut self.dst,
        }
    }

    /// Single-mode runs keep the archive by default; a full migration
    /// treats it as a scratch file.
    pub fn resolve_keep_local(&mut self) {
        if self.keep_local.is_none() {
            self.keep_local = Some(self.download_only || self.upload_only);
        }
    }

    pub fn keeps_local(&self) -> bool {
        self.keep_local.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_local_defaults_false_for_full_migration() {
        let mut input = InputModel::default();
        input.resolve_keep_local();
        assert_eq!(input.keep_local, Some(false));
    }

    #[test]
    fn keep_local_defaults_true_for_single_mode_runs() {
        let mut input = InputModel {
            download_only: true,
            ..InputModel::default()
        };
        input.resolve_keep_local();
        assert_eq!(input.keep_local, Some(true));

        let mut input = InputModel {
            upload_only: true,
            ..InputModel::default()
        };
        input.resolve_keep_local();
        assert_eq!(input.keep_local, Some(true));
    }

    #[test]
    fn keep_local_explicit_value_wins() {
        let mut input = InputModel {
            download_only: true,
            keep_local: Some(false),
            ..InputModel::default()
        };
        input.resolve_keep_local();
        assert_eq!(input.keep_local, Some(false));
    }
}
