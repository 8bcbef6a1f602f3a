//! Path handling over a flat key space.
//!
//! Object keys have no directories; a configurable separator string is what
//! makes `reports/2024/q1.csv` look like a path. The functions here are pure:
//! they never touch the store and never fail. Malformed input still yields a
//! syntactically clean result.
//!
//! ```
//! use s3vfs_core::path;
//!
//! assert_eq!(path::join(&["a//b", "../c"], "/"), "a/c");
//! assert_eq!(path::resolve("users/alice", "/", "/docs/./cv.pdf"), "users/alice/docs/cv.pdf");
//! assert_eq!(path::resolve("", "/", "."), "");
//! ```

/// Lexically simplify `path`.
///
/// Duplicate separators are collapsed, `.` segments are dropped and `..`
/// cancels the preceding segment. A `..` at the start of a rooted path is
/// dropped; at the start of a relative path it is kept. The trailing
/// separator is removed unless the result is the separator itself. An empty
/// result is `"."`.
#[must_use]
pub fn clean(path: &str, separator: &str) -> String {
    if separator.is_empty() {
        return path.to_owned();
    }
    if path.is_empty() {
        return ".".to_owned();
    }

    let rooted = path.starts_with(separator);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(separator) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }

    let body = segments.join(separator);
    if rooted {
        format!("{separator}{body}")
    } else if body.is_empty() {
        ".".to_owned()
    } else {
        body
    }
}

/// Join path elements with `separator` and clean the result.
///
/// Empty elements are ignored; if every element is empty the result is the
/// empty string.
#[must_use]
pub fn join<S: AsRef<str>>(elements: &[S], separator: &str) -> String {
    let parts: Vec<&str> = elements
        .iter()
        .map(AsRef::as_ref)
        .filter(|e| !e.is_empty())
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    clean(&parts.join(separator), separator)
}

/// Compute the object key addressed by `relative` under `root`.
///
/// The key is the cleaned join of both. Object keys never start with the
/// separator, so a leading one is stripped, and the bucket root (`"."`)
/// becomes the empty key.
#[must_use]
pub fn resolve(root: &str, separator: &str, relative: &str) -> String {
    let joined = join(&[root, relative], separator);
    let key = if separator.is_empty() {
        joined.as_str()
    } else {
        joined.trim_start_matches(separator)
    };
    if key == "." {
        String::new()
    } else {
        key.to_owned()
    }
}

/// The listing prefix for the directory at `key`: the key followed by the
/// separator, or the empty prefix for the bucket root.
#[must_use]
pub fn dir_prefix(key: &str, separator: &str) -> String {
    if key.is_empty() || key.ends_with(separator) {
        key.to_owned()
    } else {
        format!("{key}{separator}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_clean_paths() {
        let cases = [
            ("", "."),
            (".", "."),
            ("/", "/"),
            ("//", "/"),
            ("a/b/", "a/b"),
            ("a//b", "a/b"),
            ("a/./b", "a/b"),
            ("a/b/..", "a"),
            ("a/b/../..", "."),
            ("a/../..", ".."),
            ("../a", "../a"),
            ("/../a", "/a"),
            ("/a/../../b", "/b"),
            ("a/../../b/./c/", "../b/c"),
        ];
        for (input, expected) in cases {
            assert_eq!(clean(input, "/"), expected, "clean({input:?})");
        }
    }

    #[test]
    fn test_should_clean_with_custom_separator() {
        assert_eq!(clean("a::b::..::c", "::"), "a::c");
        assert_eq!(clean("::a::::b::", "::"), "::a::b");
        assert_eq!(clean("a/b|c", "|"), "a/b|c");
    }

    #[test]
    fn test_should_join_and_clean() {
        assert_eq!(join(&["a//b", "../c"], "/"), "a/c");
        assert_eq!(join(&["a", "b", "c"], "/"), "a/b/c");
        assert_eq!(join(&["", "a", "", "b"], "/"), "a/b");
        assert_eq!(join(&["/", "a"], "/"), "/a");
        assert_eq!(join::<&str>(&[], "/"), "");
        assert_eq!(join(&["", ""], "/"), "");
        assert_eq!(join(&["a", ".."], "/"), ".");
    }

    #[test]
    fn test_should_join_associatively() {
        let samples = ["", "a", "a/b", "b//c/", "./d", "x/../y", "/r"];
        for a in samples {
            for b in samples {
                for c in samples {
                    let left = join(&[join(&[a, b], "/").as_str(), c], "/");
                    let right = join(&[a, join(&[b, c], "/").as_str()], "/");
                    assert_eq!(left, right, "join({a:?}, {b:?}, {c:?})");
                }
            }
        }
    }

    #[test]
    fn test_should_resolve_keys() {
        assert_eq!(resolve("", "/", "a.txt"), "a.txt");
        assert_eq!(resolve("", "/", "/a.txt"), "a.txt");
        assert_eq!(resolve("root", "/", "a/./b//c"), "root/a/b/c");
        assert_eq!(resolve("root", "/", ""), "root");
        assert_eq!(resolve("", "/", ""), "");
        assert_eq!(resolve("", "/", "/"), "");
        assert_eq!(resolve("", "/", "."), "");
        assert_eq!(resolve("a/b", "/", ".."), "a");
    }

    #[test]
    fn test_should_address_equivalent_paths_identically() {
        let a = resolve("root", "/", "dir/file");
        let b = resolve("root", "/", "dir//./sub/../file");
        assert_eq!(a, b);
    }

    #[test]
    fn test_should_compose_chroots() {
        let samples = ["a", "a/b", "/c", "d/./e"];
        for root in ["", "base", "base/nested"] {
            for first in samples {
                for second in samples {
                    let nested = resolve(&resolve(root, "/", first), "/", second);
                    let direct = resolve(root, "/", &join(&[first, second], "/"));
                    assert_eq!(nested, direct, "chroot({root:?}, {first:?}, {second:?})");
                }
            }
        }
    }

    #[test]
    fn test_should_build_dir_prefix() {
        assert_eq!(dir_prefix("", "/"), "");
        assert_eq!(dir_prefix("a/b", "/"), "a/b/");
        assert_eq!(dir_prefix("a/b/", "/"), "a/b/");
        assert_eq!(dir_prefix("a", "::"), "a::");
    }
}
