//! Archive names identify a callable as `path::identifier`, or as a bare file name.

use std::path::Path;

pub const SEPARATOR: &str = "::";

/// Splits an archive name into its file and in-file identifier. Names that are not of the
/// form `path::identifier` are treated as a file name without an identifier.
pub fn split_archive_name(archive_name: &str) -> (&str, Option<&str>) {
    if let Some(index) = archive_name.find(SEPARATOR) {
        let (file, identifier) = (
            &archive_name[..index],
            &archive_name[index + SEPARATOR.len()..],
        );
        if is_path(file) && is_identifier(identifier) {
            return (file, Some(identifier));
        }
    }

    (archive_name, None)
}

fn is_path(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '\\'))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn make_archive_name(file: &str, identifier: &str) -> String {
    format!("{}{}{}", file, SEPARATOR, identifier)
}

/// How the instantiation driver treats a dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind<'a> {
    /// Another graph, which needs an instantiation of its own.
    Graph { file: &'a str },
    /// A function from a plain shader header, which only needs to be included.
    PlainInclude { file: &'a str },
}

pub fn classify_dependency<'a>(archive_name: &'a str, graph_extension: &str) -> DependencyKind<'a> {
    let (file, _) = split_archive_name(archive_name);
    if has_extension(file, graph_extension) {
        DependencyKind::Graph { file }
    } else {
        DependencyKind::PlainInclude { file }
    }
}

pub fn has_extension(file: &str, extension: &str) -> bool {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_file_and_identifier() {
        assert_eq!(
            split_archive_name("lib/foo.graph::Fn"),
            ("lib/foo.graph", Some("Fn"))
        );
        assert_eq!(
            split_archive_name("xleres\\Lighting\\Constants.h::Get"),
            ("xleres\\Lighting\\Constants.h", Some("Get"))
        );
    }

    #[test]
    fn names_without_separator_are_whole_file_names() {
        assert_eq!(split_archive_name("lib/foo.hlsl"), ("lib/foo.hlsl", None));
        assert_eq!(split_archive_name("Utility"), ("Utility", None));
    }

    #[test]
    fn malformed_names_are_whole_file_names() {
        assert_eq!(split_archive_name("a::b::c"), ("a::b::c", None));
        assert_eq!(split_archive_name("::Fn"), ("::Fn", None));
        assert_eq!(split_archive_name("foo.hlsl::"), ("foo.hlsl::", None));
    }

    #[test]
    fn names_outside_ascii_are_whole_file_names() {
        assert_eq!(
            split_archive_name("Effekte/Unschärfe.graph::Apply"),
            ("Effekte/Unschärfe.graph::Apply", None)
        );
        assert_eq!(
            split_archive_name("Blur.graph::Anwendé"),
            ("Blur.graph::Anwendé", None)
        );
        assert_eq!(split_archive_name("Blur.graph::Apply2"), ("Blur.graph", Some("Apply2")));
    }

    #[test]
    fn classifies_by_graph_extension() {
        assert_eq!(
            classify_dependency("lib/foo.graph::Fn", "graph"),
            DependencyKind::Graph {
                file: "lib/foo.graph"
            }
        );
        assert_eq!(
            classify_dependency("lib/foo.hlsl::Fn", "graph"),
            DependencyKind::PlainInclude {
                file: "lib/foo.hlsl"
            }
        );
        assert_eq!(
            classify_dependency("Utility::Scale", "graph"),
            DependencyKind::PlainInclude { file: "Utility" }
        );
        assert_eq!(
            classify_dependency("lib/foo.graph", "graph"),
            DependencyKind::Graph {
                file: "lib/foo.graph"
            }
        );
    }
}
