//! Markdown structurer
//!
//! Parses (link-rewritten) note text into the nested block tree. The walk
//! runs pulldown-cmark with source offsets so every block can recover its
//! raw markdown span: headings keep their inline markdown, code and math
//! bodies stay literal, lists re-parse their own source lines, and the
//! blank lines the generic AST collapses are re-inserted from the gaps
//! between block spans.
//!
//! Nesting happens last: a heading stack over an index-addressed arena
//! re-parents every block under the nearest preceding shallower heading.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use quill_core::blocks::{
    Block, BlockQuoteBlock, CodeBlock, ImageBlock, MathBlock, ParagraphBlock, Row, TableBlock,
};

use crate::lists::parse_list_block;

/// Result of structuring a note
#[derive(Debug, Clone, PartialEq)]
pub struct StructureOutcome {
    /// The nested block tree
    pub blocks: Vec<Block>,

    /// H1 titles in emission order (the navigable heading index)
    pub h1_headings: Vec<String>,
}

/// Structure note text into the nested block tree
pub fn structure(content: &str) -> StructureOutcome {
    let flat = collect_flat_blocks(content);
    let flat = interleave_blank_lines(content, flat);
    let (blocks, h1_headings) = nest_blocks(flat);

    StructureOutcome {
        blocks,
        h1_headings,
    }
}

/// One top-level markdown node with the blocks it produced
///
/// Paragraph fragmentation can yield several blocks from one node; they
/// all share the node's source span.
struct TopNode {
    blocks: Vec<Block>,
    span: Range<usize>,
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Walk the event stream and convert each top-level node to typed blocks
fn collect_flat_blocks(content: &str) -> Vec<TopNode> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_MATH;
    let mut iter = Parser::new_ext(content, options).into_offset_iter();
    let mut nodes = Vec::new();

    while let Some((event, range)) = iter.next() {
        match event {
            Event::Start(tag) => {
                let blocks = consume_node(tag, range.clone(), content, &mut iter);
                if !blocks.is_empty() {
                    nodes.push(TopNode {
                        blocks,
                        span: range,
                    });
                }
            }
            Event::Rule => nodes.push(TopNode {
                blocks: vec![Block::paragraph(content[range.clone()].trim())],
                span: range,
            }),
            _ => {}
        }
    }

    nodes
}

/// Consume the events of one top-level node and produce its blocks
fn consume_node<'a>(
    tag: Tag<'a>,
    range: Range<usize>,
    source: &str,
    iter: &mut impl Iterator<Item = (Event<'a>, Range<usize>)>,
) -> Vec<Block> {
    let slice = &source[range.clone()];

    match tag {
        Tag::Heading { level, .. } => {
            skip_to_end(iter);
            let text = slice.trim().trim_start_matches('#').trim_start();
            vec![Block::heading(heading_level_to_u8(level), text)]
        }
        Tag::CodeBlock(kind) => {
            let language = match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                _ => None,
            };
            let mut body = String::new();
            let mut depth = 1usize;
            for (event, _) in iter.by_ref() {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    Event::Text(text) => body.push_str(&text),
                    _ => {}
                }
            }
            // pulldown includes the final newline; the literal body does not
            if body.ends_with('\n') {
                body.pop();
            }
            vec![Block::Code(CodeBlock {
                content: body,
                language,
            })]
        }
        Tag::List(_) => {
            skip_to_end(iter);
            vec![Block::List(parse_list_block(slice.trim_end_matches('\n')))]
        }
        Tag::Table(_) => {
            skip_to_end(iter);
            vec![Block::Table(parse_table(slice))]
        }
        Tag::BlockQuote(_) => {
            skip_to_end(iter);
            vec![Block::BlockQuote(BlockQuoteBlock {
                content: strip_quote_markers(slice),
            })]
        }
        Tag::Paragraph => consume_paragraph(range, source, iter),
        // Anything unclassified degrades to a plain paragraph
        _ => {
            skip_to_end(iter);
            vec![Block::paragraph(slice.trim())]
        }
    }
}

/// Skip events until the current node's matching end
fn skip_to_end<'a>(iter: &mut impl Iterator<Item = (Event<'a>, Range<usize>)>) {
    let mut depth = 1usize;
    for (event, _) in iter.by_ref() {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
            _ => {}
        }
    }
}

/// Consume a paragraph node, fragmenting around any inline images
///
/// A paragraph that is exactly one image becomes an image block; one that
/// mixes text and images becomes alternating paragraph and image blocks in
/// source order. A paragraph that is exactly a display-math expression
/// becomes a math block with its body untouched.
fn consume_paragraph<'a>(
    range: Range<usize>,
    source: &str,
    iter: &mut impl Iterator<Item = (Event<'a>, Range<usize>)>,
) -> Vec<Block> {
    let mut images: Vec<(Range<usize>, ImageBlock)> = Vec::new();
    let mut open_image: Option<(Range<usize>, String, String)> = None;
    let mut depth = 1usize;

    for (event, event_range) in iter.by_ref() {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) => {
                depth += 1;
                open_image = Some((event_range, dest_url.to_string(), String::new()));
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 1 {
                    if let Some((span, src, alt)) = open_image.take() {
                        images.push((
                            span,
                            ImageBlock {
                                img_src: src,
                                img_caption: alt,
                            },
                        ));
                    }
                }
                if depth == 0 {
                    break;
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, alt)) = open_image.as_mut() {
                    alt.push_str(&text);
                }
            }
            _ => {}
        }
    }

    let slice = &source[range.clone()];
    let trimmed = slice.trim();

    if images.is_empty() {
        if let Some(body) = display_math_body(trimmed) {
            return vec![Block::Math(MathBlock {
                content: body.to_string(),
            })];
        }
        return split_paragraph_lines(trimmed);
    }

    let mut blocks = Vec::new();
    let mut cursor = range.start;
    for (span, image) in images {
        let text = source[cursor..span.start].trim();
        if !text.is_empty() {
            blocks.extend(split_paragraph_lines(text));
        }
        cursor = span.end;
        blocks.push(Block::Image(image));
    }
    let tail = source[cursor..range.end].trim();
    if !tail.is_empty() {
        blocks.extend(split_paragraph_lines(tail));
    }

    blocks
}

/// Split soft-wrapped paragraph text into one block per source line
///
/// A paragraph block holds a single line of inline markdown; a node that
/// spans several source lines becomes that many blocks, in order.
fn split_paragraph_lines(text: &str) -> Vec<Block> {
    text.lines()
        .map(|line| {
            Block::Paragraph(ParagraphBlock {
                content: line.trim().to_string(),
            })
        })
        .collect()
}

/// Extract the literal body of a paragraph that is exactly `$$ ... $$`
fn display_math_body(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix("$$")?.strip_suffix("$$")?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.trim_matches('\n'))
}

/// Parse the raw lines a table node spans into rows
///
/// The delimiter row is dropped; the first remaining row is the heading.
fn parse_table(raw: &str) -> TableBlock {
    let mut rows: Vec<Row> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let is_delimiter = line.contains('-')
            && line.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '));
        if is_delimiter {
            continue;
        }

        let values = line
            .trim_matches('|')
            .split('|')
            .map(|cell| cell.trim().to_string())
            .collect();

        rows.push(Row {
            is_heading: rows.is_empty(),
            values,
        });
    }

    TableBlock { rows }
}

/// Strip leading `>` markers from a blockquote's raw lines
fn strip_quote_markers(raw: &str) -> String {
    raw.trim_end()
        .lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix('>').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-insert the blank lines the AST collapsed
///
/// A truly empty source line becomes an empty-line marker; a line holding
/// only whitespace becomes an empty paragraph. Lines covered by a block's
/// span are left alone.
fn interleave_blank_lines(source: &str, nodes: Vec<TopNode>) -> Vec<Block> {
    if source.is_empty() {
        return Vec::new();
    }

    let starts = line_starts(source);
    // A trailing newline opens a phantom final line; ignore it
    let total_lines = if source.ends_with('\n') {
        starts.len() - 1
    } else {
        starts.len()
    };

    let mut out = Vec::new();
    let mut next_line = 0usize;

    let mut emit_gap = |out: &mut Vec<Block>, from: usize, to: usize| {
        for line in from..to.min(total_lines) {
            let text = line_text(source, &starts, line);
            if text.is_empty() {
                out.push(Block::empty_line());
            } else if text.trim().is_empty() {
                out.push(Block::paragraph(""));
            }
        }
    };

    for node in nodes {
        let begin = line_of(&starts, node.span.start);
        emit_gap(&mut out, next_line, begin);
        let last_offset = node.span.end.saturating_sub(1);
        next_line = line_of(&starts, last_offset) + 1;
        out.extend(node.blocks);
    }
    emit_gap(&mut out, next_line, total_lines);

    out
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            source
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

fn line_of(starts: &[usize], offset: usize) -> usize {
    match starts.binary_search(&offset) {
        Ok(line) => line,
        Err(insert) => insert - 1,
    }
}

fn line_text<'a>(source: &'a str, starts: &[usize], line: usize) -> &'a str {
    let begin = starts[line];
    let end = starts
        .get(line + 1)
        .map(|next| next - 1)
        .unwrap_or(source.len());
    source[begin..end].trim_end_matches('\r')
}

/// Nest a flat block sequence under its headings
///
/// Stack rule: a new heading pops every open heading of equal or deeper
/// level, then attaches to the remaining top (or the root list). Every
/// non-heading block attaches to the current top. Content preceding the
/// first heading stays at the root, in order. H1 titles are collected
/// separately in emission order.
fn nest_blocks(flat: Vec<Block>) -> (Vec<Block>, Vec<String>) {
    let mut arena: Vec<Option<Block>> = flat.into_iter().map(Some).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut h1_headings = Vec::new();

    for idx in 0..arena.len() {
        let level = arena[idx].as_ref().and_then(Block::heading_level);

        match level {
            Some(level) => {
                if level == 1 {
                    if let Some(Block::Heading(h)) = arena[idx].as_ref() {
                        h1_headings.push(h.content.clone());
                    }
                }

                while stack.last().is_some_and(|(top, _)| *top >= level) {
                    stack.pop();
                }
                match stack.last() {
                    Some((_, parent)) => children[*parent].push(idx),
                    None => roots.push(idx),
                }
                stack.push((level, idx));
            }
            None => match stack.last() {
                Some((_, parent)) => children[*parent].push(idx),
                None => roots.push(idx),
            },
        }
    }

    let blocks = roots
        .iter()
        .map(|idx| materialize(*idx, &mut arena, &children))
        .collect();

    (blocks, h1_headings)
}

fn materialize(idx: usize, arena: &mut Vec<Option<Block>>, children: &[Vec<usize>]) -> Block {
    let mut block = arena[idx].take().expect("arena slot consumed twice");

    if let Block::Heading(heading) = &mut block {
        heading.children = children[idx]
            .iter()
            .map(|child| materialize(*child, arena, children))
            .collect();
    }

    block
}
