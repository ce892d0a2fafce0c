//! CSS selector subset used by watchers and queries.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! presence and `=`, `^=`, `$=`, `*=`, `~=` operators, descendant and child
//! combinators, and comma separated groups.

use std::fmt;

use pagewatch_core_types::NodeId;

use crate::document::DomTree;
use crate::errors::SelectorError;
use crate::node::Element;

#[derive(Clone, Debug, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
}

impl AttrCondition {
    fn matches(&self, element: &Element) -> bool {
        match self {
            AttrCondition::Exists { key } => element.attrs.contains_key(key),
            AttrCondition::Eq { key, value } => element.attr(key) == Some(value.as_str()),
            AttrCondition::StartsWith { key, value } => {
                element.attr(key).is_some_and(|attr| attr.starts_with(value.as_str()))
            }
            AttrCondition::EndsWith { key, value } => {
                element.attr(key).is_some_and(|attr| attr.ends_with(value.as_str()))
            }
            AttrCondition::Contains { key, value } => {
                element.attr(key).is_some_and(|attr| attr.contains(value.as_str()))
            }
            AttrCondition::Includes { key, value } => element
                .attr(key)
                .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|class| element.has_class(class))
            && self.attrs.iter().all(|cond| cond.matches(element))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

/// A parsed selector, cheap to clone and reusable across queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<Part>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut groups = Vec::new();
        for group in split_groups(trimmed)? {
            groups.push(parse_chain(&group)?);
        }
        Ok(Self {
            source: trimmed.to_string(),
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `node` is an element matched by any selector group.
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        if tree.element(node).is_none() {
            return false;
        }
        self.groups
            .iter()
            .any(|parts| matches_chain(tree, node, parts))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

fn matches_compound(tree: &DomTree, node: NodeId, compound: &Compound) -> bool {
    tree.element(node)
        .is_some_and(|element| compound.matches(element))
}

fn matches_chain(tree: &DomTree, node: NodeId, parts: &[Part]) -> bool {
    let Some(last) = parts.last() else {
        return false;
    };
    if !matches_compound(tree, node, &last.compound) {
        return false;
    }

    let mut current = node;
    for idx in (1..parts.len()).rev() {
        let left = &parts[idx - 1].compound;
        let combinator = parts[idx].combinator.unwrap_or(Combinator::Descendant);
        let matched = match combinator {
            Combinator::Child => tree
                .parent(current)
                .filter(|parent| matches_compound(tree, *parent, left)),
            Combinator::Descendant => {
                let mut cursor = tree.parent(current);
                let mut found = None;
                while let Some(parent) = cursor {
                    if matches_compound(tree, parent, left) {
                        found = Some(parent);
                        break;
                    }
                    cursor = tree.parent(parent);
                }
                found
            }
        };
        let Some(matched) = matched else {
            return false;
        };
        current = matched;
    }
    true
}

fn unsupported(src: &str) -> SelectorError {
    SelectorError::Unsupported(src.to_string())
}

fn split_groups(selector: &str) -> Result<Vec<String>, SelectorError> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let group = current.trim();
                if group.is_empty() {
                    return Err(unsupported(selector));
                }
                groups.push(group.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if bracket_depth != 0 {
        return Err(unsupported(selector));
    }
    let group = current.trim();
    if group.is_empty() {
        return Err(unsupported(selector));
    }
    groups.push(group.to_string());
    Ok(groups)
}

fn tokenize(selector: &str) -> Result<Vec<String>, SelectorError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            '>' if bracket_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(">".to_string());
            }
            '+' | '~' | ':' | '(' | ')' if bracket_depth == 0 => {
                return Err(unsupported(selector));
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                flush(&mut current, &mut tokens);
            }
            _ => current.push(ch),
        }
    }
    if bracket_depth != 0 {
        return Err(unsupported(selector));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_chain(selector: &str) -> Result<Vec<Part>, SelectorError> {
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(selector)? {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err(unsupported(selector));
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(unsupported(selector));
    }
    Ok(parts)
}

fn parse_compound(part: &str) -> Result<Compound, SelectorError> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut compound = Compound::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if compound.universal || compound.tag.is_some() || i != 0 {
                    return Err(unsupported(part));
                }
                compound.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                if compound.id.replace(id).is_some() {
                    return Err(unsupported(part));
                }
                i = next;
            }
            b'.' => {
                let (class, next) = parse_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                compound.classes.push(class);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(part, i)?;
                compound.attrs.push(cond);
                i = next;
            }
            _ => {
                if i != 0 {
                    return Err(unsupported(part));
                }
                let (tag, next) = parse_ident(part, i).ok_or_else(|| unsupported(part))?;
                compound.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }
    Ok(compound)
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn parse_attr_condition(src: &str, open: usize) -> Result<(AttrCondition, usize), SelectorError> {
    let bytes = src.as_bytes();
    let mut i = skip_ws(bytes, open + 1);

    let key_start = i;
    while i < bytes.len() && (is_ident_char(bytes[i]) || bytes[i] == b':') {
        i += 1;
    }
    if key_start == i {
        return Err(unsupported(src));
    }
    let key = src[key_start..i].to_ascii_lowercase();

    i = skip_ws(bytes, i);
    match bytes.get(i) {
        Some(b']') => return Ok((AttrCondition::Exists { key }, i + 1)),
        None => return Err(unsupported(src)),
        _ => {}
    }

    let (op, after_op) = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'='), _) => (b'=', i + 1),
        (Some(op @ (b'^' | b'$' | b'*' | b'~')), Some(b'=')) => (*op, i + 2),
        _ => return Err(unsupported(src)),
    };

    i = skip_ws(bytes, after_op);
    let (value, after_value) = parse_attr_value(src, i)?;
    i = skip_ws(bytes, after_value);
    if bytes.get(i) != Some(&b']') {
        return Err(unsupported(src));
    }

    let cond = match op {
        b'=' => AttrCondition::Eq { key, value },
        b'^' => AttrCondition::StartsWith { key, value },
        b'$' => AttrCondition::EndsWith { key, value },
        b'*' => AttrCondition::Contains { key, value },
        _ => AttrCondition::Includes { key, value },
    };
    Ok((cond, i + 1))
}

fn parse_attr_value(src: &str, start: usize) -> Result<(String, usize), SelectorError> {
    let bytes = src.as_bytes();
    match bytes.get(start) {
        Some(&quote @ (b'"' | b'\'')) => {
            let close = src[start + 1..]
                .find(quote as char)
                .ok_or_else(|| unsupported(src))?;
            let end = start + 1 + close;
            Ok((src[start + 1..end].to_string(), end + 1))
        }
        Some(_) => {
            let mut end = start;
            while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b']' {
                end += 1;
            }
            if end == start {
                return Err(unsupported(src));
            }
            Ok((src[start..end].to_string(), end))
        }
        None => Err(unsupported(src)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn fixture() -> (Document, NodeId, NodeId, NodeId) {
        let doc = Document::new("https://example.test/menu", 8);
        let list = doc.create_element("ul");
        doc.set_attribute(list, "id", "menu").unwrap();
        doc.set_attribute(list, "class", "items primary").unwrap();
        let item = doc.create_element("li");
        doc.set_attribute(item, "class", "item").unwrap();
        doc.set_attribute(item, "data-price", "12.00").unwrap();
        let price = doc.create_element("span");
        doc.set_attribute(price, "class", "price").unwrap();
        doc.append_child(item, price).unwrap();
        doc.append_child(list, item).unwrap();
        doc.append_child(doc.root(), list).unwrap();
        (doc, list, item, price)
    }

    #[test]
    fn matches_simple_compounds() {
        let (doc, list, item, _) = fixture();
        doc.read(|tree| {
            assert!(Selector::parse("ul").unwrap().matches(tree, list));
            assert!(Selector::parse("#menu").unwrap().matches(tree, list));
            assert!(Selector::parse("ul.items.primary").unwrap().matches(tree, list));
            assert!(Selector::parse("*").unwrap().matches(tree, item));
            assert!(!Selector::parse(".missing").unwrap().matches(tree, list));
        });
    }

    #[test]
    fn matches_attribute_operators() {
        let (doc, _, item, _) = fixture();
        doc.read(|tree| {
            for source in [
                "[data-price]",
                "[data-price=\"12.00\"]",
                "[data-price^=12]",
                "[data-price$='.00']",
                "[data-price*=2.0]",
                "li[class~=item]",
            ] {
                assert!(
                    Selector::parse(source).unwrap().matches(tree, item),
                    "{source} should match"
                );
            }
            assert!(!Selector::parse("[data-price=13]").unwrap().matches(tree, item));
        });
    }

    #[test]
    fn matches_combinators_and_groups() {
        let (doc, list, _, price) = fixture();
        doc.read(|tree| {
            assert!(Selector::parse("#menu .price").unwrap().matches(tree, price));
            assert!(Selector::parse("li > span").unwrap().matches(tree, price));
            assert!(!Selector::parse("ul > span").unwrap().matches(tree, price));
            assert!(Selector::parse("table, #menu").unwrap().matches(tree, list));
        });
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        for source in ["li:first-child", "a + b", "a ~ b", "a >", "[x", "a,,b", "li*"] {
            assert!(Selector::parse(source).is_err(), "{source} should fail");
        }
    }

    #[test]
    fn text_nodes_never_match() {
        let doc = Document::new("about:blank", 4);
        let text = doc.create_text("hello");
        doc.append_child(doc.root(), text).unwrap();
        doc.read(|tree| assert!(!Selector::parse("*").unwrap().matches(tree, text)));
    }
}
