use crate::protocol::PathMapping;

/// Translates the paths the runtime reports into the client's paths, using the
/// `pathMappings` of the attach request.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    /// `(remote_root, local_root)`, longest remote root first.
    mappings: Vec<(String, String)>,
}

impl SourceMap {
    pub fn new(mappings: &[PathMapping]) -> Self {
        let mut mappings: Vec<(String, String)> = mappings
            .iter()
            .map(|m| (normalize(&m.remote_root), normalize(&m.local_root)))
            .collect();
        mappings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { mappings }
    }

    pub fn to_local(&self, remote: &str) -> String {
        let path = normalize(remote);
        self.mappings
            .iter()
            .find_map(|(remote_root, local_root)| {
                let rest = strip_root(&path, remote_root)?;
                Some(match (local_root.is_empty(), rest.is_empty()) {
                    (_, true) => local_root.clone(),
                    (true, false) => rest.to_string(),
                    (false, false) => format!("{}/{}", local_root, rest),
                })
            })
            .unwrap_or(path)
    }
}

/// Last path component, accepting both separators.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    match path.trim_end_matches('/') {
        "." => String::new(),
        trimmed => trimmed.to_string(),
    }
}

fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(path.trim_start_matches('/'));
    }
    match path.strip_prefix(root)? {
        "" => Some(""),
        rest => rest.strip_prefix('/'),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn mapping(local: &str, remote: &str) -> PathMapping {
        PathMapping {
            local_root: local.to_string(),
            remote_root: remote.to_string(),
        }
    }

    #[rstest]
    #[case(vec![], "target.py", "target.py")]
    #[case(vec![mapping("/work/src", ".")], "target.py", "/work/src/target.py")]
    #[case(vec![mapping("/work/src", "/")], "/lib/util.py", "/work/src/lib/util.py")]
    #[case(vec![mapping("C:\\work\\src", "/app")], "/app/target.py", "C:/work/src/target.py")]
    #[case(vec![mapping("/a", "/app"), mapping("/b", "/app/lib")], "/app/lib/x.py", "/b/x.py")]
    #[case(vec![mapping("/a", "/app")], "/application/x.py", "/application/x.py")]
    fn test_to_local(#[case] mappings: Vec<PathMapping>, #[case] remote: &str, #[case] expected: &str) {
        assert_eq!(SourceMap::new(&mappings).to_local(remote), expected);
    }

    #[rstest]
    #[case("/abs/src/target.py", "target.py")]
    #[case("./target.py", "target.py")]
    #[case("src\\target.py", "target.py")]
    #[case("target.py", "target.py")]
    fn test_file_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(file_name(path), expected);
    }
}
