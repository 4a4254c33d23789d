//! `@name` mentions in chat text.
//!
//! Mentions are hints for the shell to display. They are never expanded and
//! never change which files are attached to a request.

use regex::Regex;
use std::sync::OnceLock;

use crate::tree::{find_file, FileNode};

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([\w\-.]+)").expect("mention pattern is valid"))
}

/// Mentioned names in order of appearance, duplicates kept.
pub fn parse_mentions(text: &str) -> Vec<String> {
    mention_regex()
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// A mention and the project file it matched, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMention {
    pub name: String,
    pub path: Option<String>,
}

pub fn resolve_mentions(tree: &[FileNode], text: &str) -> Vec<ResolvedMention> {
    parse_mentions(text)
        .into_iter()
        .map(|name| {
            let path = find_file(tree, &name).map(|node| node.path.clone());
            ResolvedMention { name, path }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mentions() {
        assert_eq!(
            parse_mentions("Summarize @notes.md and compare with @draft-2.txt."),
            vec!["notes.md", "draft-2.txt."]
        );
        assert!(parse_mentions("email me at nobody").is_empty());
    }

    #[test]
    fn test_resolve_against_tree() {
        let tree = vec![FileNode {
            name: "notes".into(),
            path: "/p/notes".into(),
            is_dir: true,
            children: vec![FileNode {
                name: "notes.md".into(),
                path: "/p/notes/notes.md".into(),
                is_dir: false,
                children: Vec::new(),
            }],
        }];
        let resolved = resolve_mentions(&tree, "Summarize @notes.md, ignore @ghost.md");
        assert_eq!(
            resolved,
            vec![
                ResolvedMention {
                    name: "notes.md".into(),
                    path: Some("/p/notes/notes.md".into()),
                },
                ResolvedMention {
                    name: "ghost.md".into(),
                    path: None,
                },
            ]
        );
    }
}
