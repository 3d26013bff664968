//! Rewriting of the remote shell command handed to rsync via `-e`.
//!
//! Backup listers describe the transport as a full login command ending in
//! `user@host`. rsync gets the host as part of the endpoint address, so the
//! trailing login target is replaced by `-l <user>`.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static LOGIN_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>\S.*?)\s+(?P<user>[^\s@]+)@(?P<host>[^\s@]+)\s*$")
        .expect("login target pattern is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RemoteShellError {
    #[error("Unparseable remote shell command (expected '<command> <user>@<host>'): {0:?}")]
    Unparseable(String),
}

/// Transport forced when an SSH identity is configured; the backup side
/// always needs root access.
pub fn identity_shell(identity: &Path) -> String {
    format!(
        "ssh -q -i {} -l root",
        shell_words::quote(&identity.to_string_lossy())
    )
}

/// Work out the `-e` argument for rsync, if any.
///
/// * `spec` - the remote shell command from the inventory record
/// * `identity` - an SSH identity that overrides the transport entirely
/// * `remote` - whether either side of the pair lives on another host
pub fn resolve_remote_shell(
    spec: Option<&str>,
    identity: Option<&Path>,
    remote: bool,
) -> Result<Option<String>, RemoteShellError> {
    if remote && let Some(identity) = identity {
        return Ok(Some(identity_shell(identity)));
    }

    let spec = match spec.map(str::trim) {
        Some(spec) if !spec.is_empty() => spec,
        _ => return Ok(None),
    };

    let captures = LOGIN_TARGET
        .captures(spec)
        .ok_or_else(|| RemoteShellError::Unparseable(spec.to_string()))?;

    Ok(Some(format!("{} -l {}", &captures["base"], &captures["user"])))
}
