//! Section-oriented structuring
//!
//! The alternate hierarchical view: a plain line scan that folds note text
//! into a tree of [`Section`]s keyed by heading depth, without going
//! through the block model. Content ahead of the first heading lands in a
//! level-0 pseudo-section, dropped when empty.
//!
//! Heading detection is line-based, so fenced code blocks need explicit
//! handling: a fence toggle tracks open ``` / ~~~ regions and suppresses
//! heading matches inside them.

use quill_core::section::Section;
use regex::Regex;
use std::sync::LazyLock;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("heading regex"));

/// Result of section-structuring a note
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    /// The nested section tree
    pub sections: Vec<Section>,

    /// H1 titles in emission order
    pub h1_headings: Vec<String>,
}

/// Fold note text into a nested section tree
pub fn structure_sections(content: &str) -> SectionOutcome {
    let mut arena: Vec<Section> = Vec::new();
    let mut children: Vec<Vec<usize>> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    // (heading level, arena index) of every open ancestor section
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut h1_headings = Vec::new();

    // Content before the first heading accumulates at level 0
    arena.push(Section::new("", "", 0));
    children.push(Vec::new());
    roots.push(0);

    let mut open_fence: Option<&str> = None;

    for line in content.lines() {
        let trimmed = line.trim_start();
        for marker in ["```", "~~~"] {
            if trimmed.starts_with(marker) {
                match open_fence {
                    None => open_fence = Some(marker),
                    Some(open) if open == marker => open_fence = None,
                    Some(_) => {}
                }
                break;
            }
        }

        let heading = if open_fence.is_none() {
            HEADING_RE.captures(line)
        } else {
            None
        };

        match heading {
            Some(cap) => {
                let level = cap.get(1).map_or(0, |m| m.as_str().len()) as u8;
                let title = cap.get(2).map_or("", |m| m.as_str()).trim();
                if level == 1 {
                    h1_headings.push(title.to_string());
                }

                while stack.last().is_some_and(|(top, _)| *top >= level) {
                    stack.pop();
                }

                let idx = arena.len();
                arena.push(Section::new(title, "", level));
                children.push(Vec::new());
                match stack.last() {
                    Some((_, parent)) => children[*parent].push(idx),
                    None => roots.push(idx),
                }
                stack.push((level, idx));
            }
            None => {
                let target = stack.last().map(|(_, idx)| *idx).unwrap_or(0);
                if !arena[target].content.is_empty() {
                    arena[target].content.push('\n');
                }
                arena[target].content.push_str(line);
            }
        }
    }

    let mut sections: Vec<Section> = roots
        .iter()
        .map(|idx| materialize(*idx, &mut arena, &children))
        .collect();

    // Drop the pseudo-section when nothing preceded the first heading
    if sections
        .first()
        .is_some_and(|s| s.heading_level == 0 && s.is_empty())
    {
        sections.remove(0);
    }

    SectionOutcome {
        sections,
        h1_headings,
    }
}

fn materialize(idx: usize, arena: &mut [Section], children: &[Vec<usize>]) -> Section {
    let mut section = std::mem::take(&mut arena[idx]);
    section.children = children[idx]
        .iter()
        .map(|child| materialize(*child, arena, children))
        .collect();
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_sections() {
        let outcome = structure_sections("# Top\nbody\n## Mid\ninner\n# Top Two");

        assert_eq!(outcome.sections.len(), 2);
        assert_eq!(outcome.sections[0].title, "Top");
        assert_eq!(outcome.sections[0].content, "body");
        assert_eq!(outcome.sections[0].children.len(), 1);
        assert_eq!(outcome.sections[0].children[0].title, "Mid");
        assert_eq!(outcome.sections[0].children[0].content, "inner");
        assert_eq!(outcome.sections[1].title, "Top Two");
        assert_eq!(outcome.h1_headings, vec!["Top", "Top Two"]);
    }

    #[test]
    fn test_equal_level_pops_stack() {
        let outcome = structure_sections("## A\n## B");

        assert_eq!(outcome.sections.len(), 2);
        assert_eq!(outcome.sections[0].title, "A");
        assert_eq!(outcome.sections[1].title, "B");
    }

    #[test]
    fn test_content_before_first_heading() {
        let outcome = structure_sections("intro\n# First\nbody");

        assert_eq!(outcome.sections.len(), 2);
        assert_eq!(outcome.sections[0].heading_level, 0);
        assert_eq!(outcome.sections[0].content, "intro");
        assert_eq!(outcome.sections[1].title, "First");
    }

    #[test]
    fn test_empty_leading_section_dropped() {
        let outcome = structure_sections("# Only\nbody");

        assert_eq!(outcome.sections.len(), 1);
        assert_eq!(outcome.sections[0].title, "Only");
    }

    #[test]
    fn test_heading_inside_fence_is_content() {
        let outcome = structure_sections("# Real\n```\n# fake\n```\nafter");

        assert_eq!(outcome.sections.len(), 1);
        assert_eq!(outcome.sections[0].title, "Real");
        assert_eq!(outcome.sections[0].content, "```\n# fake\n```\nafter");
        assert_eq!(outcome.h1_headings, vec!["Real"]);
    }

    #[test]
    fn test_tilde_fence_closed_by_tilde_only() {
        let outcome = structure_sections("~~~\n# fake\n~~~\n# Real");

        assert_eq!(outcome.sections.len(), 2);
        assert_eq!(outcome.sections[0].heading_level, 0);
        assert_eq!(outcome.sections[1].title, "Real");
    }

    #[test]
    fn test_deeper_then_shallower() {
        let outcome = structure_sections("# A\n### Deep\n## Back");

        let a = &outcome.sections[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].title, "Deep");
        assert_eq!(a.children[1].title, "Back");
    }
}
