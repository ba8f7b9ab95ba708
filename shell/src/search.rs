use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;
use std::env;

pub const PATH_KEY: &str = "PATH";

/// Resolves `name` against the current `PATH`.
pub fn lookup(name: &[u8]) -> Option<CString> {
	resolve(name, env::var_os(PATH_KEY).as_deref())
}

/// Resolves a program name to the path that will be exec'd.
///
/// A name containing `/` is returned as is. Otherwise every directory of
/// `search_path` is tried in order and the first existing `dir/name` wins.
/// Only existence is checked, not whether the file is executable. Each call
/// returns a fresh owned path, so nothing is shared between callers.
pub fn resolve(name: &[u8], search_path: Option<&OsStr>) -> Option<CString> {
	if name.is_empty() || name.contains(&0) {
		return None;
	}
	if name.contains(&b'/') {
		return CString::new(name).ok();
	}
	let search_path = search_path?;
	for dir in search_path.as_bytes().split(|&c| c == b':') {
		if dir.is_empty() {
			continue;
		}
		let mut candidate = Vec::with_capacity(dir.len() + 1 + name.len());
		candidate.extend_from_slice(dir);
		candidate.push(b'/');
		candidate.extend_from_slice(name);
		let candidate = OsString::from_vec(candidate);
		if Path::new(&candidate).exists() {
			return CString::new(candidate.into_vec()).ok();
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn touch(dir: &Path, name: &str) {
		fs::write(dir.join(name), b"").unwrap();
	}

	#[test]
	fn slash_is_not_searched() {
		let r = resolve(b"./configure", None).unwrap();
		assert_eq!(r.as_bytes(), b"./configure");
		let r = resolve(b"/no/such/bin", Some(OsStr::new("/usr/bin"))).unwrap();
		assert_eq!(r.as_bytes(), b"/no/such/bin");
	}

	#[test]
	fn first_hit_wins() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		touch(b.path(), "tool");
		touch(a.path(), "tool");
		let path = format!("{}:{}", a.path().display(), b.path().display());
		let r = resolve(b"tool", Some(OsStr::new(&path))).unwrap();
		assert_eq!(Path::new(OsStr::from_bytes(r.as_bytes())), a.path().join("tool"));
	}

	#[test]
	fn skips_missing_and_empty_entries() {
		let a = tempfile::tempdir().unwrap();
		touch(a.path(), "tool");
		let path = format!("::/nonexistent-dir:{}", a.path().display());
		let r = resolve(b"tool", Some(OsStr::new(&path))).unwrap();
		assert_eq!(Path::new(OsStr::from_bytes(r.as_bytes())), a.path().join("tool"));
	}

	#[test]
	fn not_found() {
		let a = tempfile::tempdir().unwrap();
		let path = a.path().as_os_str().to_owned();
		assert_eq!(resolve(b"tool", Some(&path)), None);
		assert_eq!(resolve(b"tool", None), None);
		assert_eq!(resolve(b"", Some(&path)), None);
	}

	#[test]
	fn existence_not_executability() {
		let a = tempfile::tempdir().unwrap();
		touch(a.path(), "data.txt");
		assert!(resolve(b"data.txt", Some(a.path().as_os_str())).is_some());
	}
}
