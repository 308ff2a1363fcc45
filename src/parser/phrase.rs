use std::sync::LazyLock;

use regex::Regex;

use super::leaves::LeafNode;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.*)\((.*)\)").unwrap());
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/m\.exe\?a=[0-9]*&(?:amp;)?UserName=(.*)").unwrap());

/// One reassembled phrase with the metadata that was in force when it was
/// flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseEntry {
    pub phrase: String,
    pub comment: String,
    pub author_name: String,
    pub author_link: String,
}

/// Reassemble one translation cell's leaf sequence into discrete phrases.
///
/// Text fragments accumulate until a separator (`;`) leaf flushes them as one
/// phrase; the final leaf, if text, is appended and flushed unconditionally.
/// Anchor leaves update the cell's author state without touching the
/// accumulator; all other markup is skipped (its text arrives as later text
/// leaves). Whitespace-only flushes emit nothing.
pub fn reassemble(nodes: &[LeafNode]) -> Vec<PhraseEntry> {
    let mut entries = Vec::new();
    let mut fragments: Vec<&str> = Vec::new();
    let mut author_name = String::new();
    let mut author_link = String::new();

    let last = nodes.len().saturating_sub(1);
    for (i, node) in nodes.iter().enumerate() {
        match node {
            LeafNode::Text(value) => {
                if value.trim() == ";" {
                    flush(&mut fragments, &author_name, &author_link, &mut entries);
                } else if i == last {
                    fragments.push(value);
                    flush(&mut fragments, &author_name, &author_link, &mut entries);
                } else {
                    fragments.push(value);
                }
            }
            LeafNode::Markup { tag, href, .. } if tag == "a" => {
                let matched = href
                    .as_deref()
                    .and_then(|h| AUTHOR_RE.captures(h).map(|caps| (caps, h)));
                match matched {
                    Some((caps, href)) => {
                        author_name = caps[1].trim().to_string();
                        author_link = href.trim().to_string();
                    }
                    None => {
                        author_name.clear();
                        author_link.clear();
                    }
                }
            }
            LeafNode::Markup { .. } => {}
        }
    }

    entries
}

fn flush(
    fragments: &mut Vec<&str>,
    author_name: &str,
    author_link: &str,
    entries: &mut Vec<PhraseEntry>,
) {
    let joined = fragments.concat();
    fragments.clear();
    if joined.trim().is_empty() {
        return;
    }
    let (phrase, comment) = split_comment(&joined);
    entries.push(PhraseEntry {
        phrase: phrase.trim().to_string(),
        comment: comment.trim().to_string(),
        author_name: author_name.to_string(),
        author_link: author_link.to_string(),
    });
}

/// Split a raw phrase into (phrase, comment) on its final parenthesized
/// group; text after the closing paren is dropped. No parens means no
/// comment.
fn split_comment(raw: &str) -> (&str, &str) {
    match COMMENT_RE.captures(raw) {
        Some(caps) => {
            let phrase = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let comment = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            (phrase, comment)
        }
        None => (raw, ""),
    }
}
