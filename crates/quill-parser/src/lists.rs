//! Line-level list parsing
//!
//! The generic markdown AST flattens list structure we need to keep:
//! literal markers, checkbox state, and indentation-driven nesting. The
//! structurer hands this module the raw source lines a list node spans and
//! gets back the typed list forest.
//!
//! Nesting key is indentation width with tabs expanded to 4 spaces. Lines
//! that match no item pattern are continuation text of the previous item,
//! which is how multi-line items and embedded quotes inside items survive.

use quill_core::blocks::{Block, ListBlock, ListItem, ListKind};
use regex::Regex;
use std::sync::LazyLock;

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)([-*+] \[[ xX]\])\s+(.*)$").expect("checkbox regex"));

static ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(\d+[.)])\s+(.*)$").expect("ordered regex"));

static UNORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)([-*+])\s+(.*)$").expect("unordered regex"));

/// One classified source line
struct ItemLine<'a> {
    indent: usize,
    marker: &'a str,
    kind: ListKind,
    text: &'a str,
}

/// Item under construction in the flat arena
struct RawItem {
    content: String,
    kind: ListKind,
    marker: String,
    children: Vec<usize>,
}

/// Indentation width with tabs expanded to 4 spaces
fn indent_width(indent: &str) -> usize {
    indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Classify a single source line as a list item, if it is one
fn classify(line: &str) -> Option<ItemLine<'_>> {
    for (re, kind) in [
        (&*CHECKBOX_RE, ListKind::Checkbox),
        (&*ORDERED_RE, ListKind::Ordered),
        (&*UNORDERED_RE, ListKind::Unordered),
    ] {
        if let Some(cap) = re.captures(line) {
            return Some(ItemLine {
                indent: indent_width(cap.get(1).map_or("", |m| m.as_str())),
                marker: cap.get(2).map_or("", |m| m.as_str()),
                kind,
                text: cap.get(3).map_or("", |m| m.as_str()),
            });
        }
    }
    None
}

/// Parse the raw source lines of a list node into a typed list forest
pub fn parse_list_block(raw: &str) -> ListBlock {
    let mut items: Vec<RawItem> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    // (indent width, arena index) of every open ancestor item
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for line in raw.lines() {
        match classify(line) {
            Some(item) => {
                while stack.last().is_some_and(|(indent, _)| *indent >= item.indent) {
                    stack.pop();
                }

                let idx = items.len();
                items.push(RawItem {
                    content: item.text.trim_end().to_string(),
                    kind: item.kind,
                    marker: item.marker.to_string(),
                    children: Vec::new(),
                });

                match stack.last() {
                    Some((_, parent)) => items[*parent].children.push(idx),
                    None => roots.push(idx),
                }
                stack.push((item.indent, idx));
            }
            None => {
                // Continuation of the previous item, or noise before the
                // first item (dropped)
                if let Some((_, idx)) = stack.last() {
                    let text = line.trim();
                    if !text.is_empty() {
                        items[*idx].content.push('\n');
                        items[*idx].content.push_str(text);
                    }
                }
            }
        }
    }

    ListBlock {
        content: roots.iter().map(|idx| build_item(*idx, &items)).collect(),
    }
}

/// Materialize one arena item, nesting its children as a single sub-list
fn build_item(idx: usize, items: &[RawItem]) -> ListItem {
    let raw = &items[idx];
    let children = if raw.children.is_empty() {
        Vec::new()
    } else {
        vec![Block::List(ListBlock {
            content: raw
                .children
                .iter()
                .map(|child| build_item(*child, items))
                .collect(),
        })]
    };

    ListItem {
        content: raw.content.clone(),
        list_type: raw.kind,
        marker: raw.marker.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_unordered_list() {
        let list = parse_list_block("- one\n- two\n- three");

        assert_eq!(list.content.len(), 3);
        assert_eq!(list.content[0].content, "one");
        assert_eq!(list.content[0].list_type, ListKind::Unordered);
        assert_eq!(list.content[0].marker, "-");
        assert!(list.content[0].children.is_empty());
    }

    #[test]
    fn test_indentation_nesting() {
        let list = parse_list_block("- A\n  - B\n- C");

        assert_eq!(list.content.len(), 2);
        assert_eq!(list.content[0].content, "A");
        assert_eq!(list.content[1].content, "C");

        let Block::List(nested) = &list.content[0].children[0] else {
            panic!("expected nested list under A");
        };
        assert_eq!(nested.content.len(), 1);
        assert_eq!(nested.content[0].content, "B");
    }

    #[test]
    fn test_tab_indentation_expands() {
        let list = parse_list_block("- A\n\t- B");

        let Block::List(nested) = &list.content[0].children[0] else {
            panic!("expected nested list under A");
        };
        assert_eq!(nested.content[0].content, "B");
    }

    #[test]
    fn test_ordered_and_checkbox_markers() {
        let list = parse_list_block("1. first\n2) second\n- [x] done\n- [ ] open");

        assert_eq!(list.content.len(), 4);
        assert_eq!(list.content[0].list_type, ListKind::Ordered);
        assert_eq!(list.content[0].marker, "1.");
        assert_eq!(list.content[1].marker, "2)");
        assert_eq!(list.content[2].list_type, ListKind::Checkbox);
        assert_eq!(list.content[2].marker, "- [x]");
        assert_eq!(list.content[3].marker, "- [ ]");
        assert_eq!(list.content[3].content, "open");
    }

    #[test]
    fn test_continuation_lines_append_to_previous_item() {
        let list = parse_list_block("- first line\n  continued text\n  > quoted inside\n- next");

        assert_eq!(list.content.len(), 2);
        assert_eq!(
            list.content[0].content,
            "first line\ncontinued text\n> quoted inside"
        );
        assert_eq!(list.content[1].content, "next");
    }

    #[test]
    fn test_deep_nesting() {
        let list = parse_list_block("- A\n  - B\n    - C\n- D");

        let Block::List(level2) = &list.content[0].children[0] else {
            panic!("expected nested list");
        };
        let Block::List(level3) = &level2.content[0].children[0] else {
            panic!("expected doubly nested list");
        };
        assert_eq!(level3.content[0].content, "C");
        assert_eq!(list.content[1].content, "D");
    }
}
