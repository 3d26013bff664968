use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::{Path, PathBuf};

pub fn snapcheck_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("snapcheck");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// Stand-in for rsync that replays canned output per backup directory.
///
/// For a backup path ending in `NAME/` it prints `NAME.out` and exits with
/// the code in `NAME.code`, both looked up next to the script. Every
/// invocation's arguments are appended to `invocations.log`.
const FAKE_RSYNC: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$@" >> "$dir/invocations.log"
for last; do :; done
name="${last%/}"
name="${name##*/}"
if [ -f "$dir/$name.out" ]; then cat "$dir/$name.out"; fi
if [ -f "$dir/$name.code" ]; then exit "$(cat "$dir/$name.code")"; fi
exit 0
"#;

// Each integration test file is compiled as its own crate, and not all of
// them need the rsync helpers.
#[allow(dead_code)]
pub struct FakeRsync {
    pub dir: PathBuf,
    pub program: PathBuf,
}

#[allow(dead_code)]
impl FakeRsync {
    #[cfg(unix)]
    pub fn install(dir: &Path) -> Self {
        let dir = dir.join("fake-rsync");
        fs::create_dir_all(&dir).unwrap();
        let program = dir.join("rsync");
        write_script(&program, FAKE_RSYNC);
        FakeRsync { dir, program }
    }

    pub fn respond(&self, name: &str, output: &str, code: i32) {
        fs::write(self.dir.join(format!("{name}.out")), output).unwrap();
        fs::write(self.dir.join(format!("{name}.code")), code.to_string()).unwrap();
    }

    pub fn invocations(&self) -> Vec<String> {
        match fs::read_to_string(self.dir.join("invocations.log")) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(unix)]
#[allow(dead_code)]
pub fn write_script(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Write a pairs file with one local record per `name`.
#[allow(dead_code)]
pub fn write_pairs(dir: &Path, names: &[&str]) -> PathBuf {
    let content: String = names
        .iter()
        .map(|name| format!("snapshot_path='/snap/{name}' target_path='/backup/{name}'\n"))
        .collect();
    let path = dir.join("pairs.txt");
    fs::write(&path, content).unwrap();
    path
}
