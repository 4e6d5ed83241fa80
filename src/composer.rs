//! Goal composer
//!
//! A goal is an ordered list of segments: plain text runs and tool tokens.
//! Tokens are atomic. The caret counts *atoms* (one per character, one per
//! token), so no edit can land inside a token.
//!
//! Flattening emits text verbatim and each token as `category` immediately
//! followed by its serialized data, then trims the result. Nothing is
//! escaped: text that happens to look like `category{...}` is
//! indistinguishable from a real token once flattened.

use crate::bridge::ToolTransfer;

pub type TokenId = u64;

/// One embedded tool ("pill")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolToken {
    pub id: TokenId,
    pub category: String,
    pub serialized_data: String,
    pub display_name: String,
}

impl ToolToken {
    /// Wire form of this token inside a flattened goal
    pub fn encoding(&self) -> String {
        format!("{}{}", self.category, self.serialized_data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Token(ToolToken),
}

impl Segment {
    fn atoms(&self) -> usize {
        match self {
            Segment::Text(s) => s.chars().count(),
            Segment::Token(_) => 1,
        }
    }
}

/// What sits at a caret-addressable position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atom<'a> {
    Char(char),
    Token(&'a ToolToken),
}

#[derive(Debug, Clone, Default)]
pub struct GoalDocument {
    segments: Vec<Segment>,
    caret: Option<usize>,
    next_id: TokenId,
}

impl GoalDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn tokens(&self) -> impl Iterator<Item = &ToolToken> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token(t) => Some(t),
            Segment::Text(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when flattening would produce an empty goal
    pub fn is_blank(&self) -> bool {
        self.serialize().is_empty()
    }

    /// Number of caret-addressable atoms
    pub fn len(&self) -> usize {
        self.segments.iter().map(Segment::atoms).sum()
    }

    pub fn caret(&self) -> Option<usize> {
        self.caret
    }

    pub fn set_caret(&mut self, pos: usize) {
        self.caret = Some(pos.min(self.len()));
    }

    fn insertion_point(&self) -> usize {
        let len = self.len();
        self.caret.map_or(len, |c| c.min(len))
    }

    pub fn move_left(&mut self) {
        let pos = self.insertion_point();
        self.caret = Some(pos.saturating_sub(1));
    }

    pub fn move_right(&mut self) {
        let pos = self.insertion_point();
        self.caret = Some((pos + 1).min(self.len()));
    }

    pub fn move_home(&mut self) {
        self.caret = Some(0);
    }

    pub fn move_end(&mut self) {
        self.caret = Some(self.len());
    }

    /// Reset to an empty document
    pub fn clear(&mut self) {
        self.segments.clear();
        self.caret = None;
    }

    /// Insert a tool token at the caret (or at the end when there is none).
    /// The caret ends up right after the token.
    pub fn insert_token(&mut self, name: &str, category: &str, data: &str) -> TokenId {
        let id = self.next_id;
        self.next_id += 1;

        let token = ToolToken {
            id,
            category: category.to_string(),
            serialized_data: data.to_string(),
            display_name: name.to_string(),
        };

        let pos = self.insertion_point();
        let idx = self.split_at(pos);
        self.segments.insert(idx, Segment::Token(token));
        self.normalize();
        self.caret = Some(pos + 1);

        tracing::debug!(token = id, category, "token inserted at {}", pos);
        id
    }

    /// Drop a palette transfer at the caret
    pub fn insert_transfer(&mut self, t: &ToolTransfer) -> TokenId {
        self.insert_token(&t.display_name, &t.category, &t.payload)
    }

    /// Insert typed or pasted text at the caret
    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = self.insertion_point();
        let idx = self.split_at(pos);
        self.segments.insert(idx, Segment::Text(text.to_string()));
        self.normalize();
        self.caret = Some(pos + text.chars().count());
    }

    /// Remove exactly one token. Returns false when no token has this id.
    pub fn remove_token(&mut self, id: TokenId) -> bool {
        let mut pos = 0;
        let mut found = None;
        for (i, seg) in self.segments.iter().enumerate() {
            if let Segment::Token(t) = seg {
                if t.id == id {
                    found = Some(i);
                    break;
                }
            }
            pos += seg.atoms();
        }

        let Some(idx) = found else {
            return false;
        };

        self.segments.remove(idx);
        self.normalize();
        if let Some(c) = self.caret {
            if c > pos {
                self.caret = Some(c - 1);
            }
        }
        true
    }

    /// Delete the atom before the caret. A token goes as a unit.
    pub fn backspace(&mut self) {
        let pos = self.insertion_point();
        if pos == 0 {
            self.caret = Some(0);
            return;
        }
        self.delete_atom(pos - 1);
        self.caret = Some(pos - 1);
    }

    /// Delete the atom after the caret. A token goes as a unit.
    pub fn delete(&mut self) {
        let pos = self.insertion_point();
        if pos < self.len() {
            self.delete_atom(pos);
        }
        self.caret = Some(pos);
    }

    /// Token the dismiss gesture targets: the one right before the caret,
    /// else the one right after it
    pub fn pill_at_caret(&self) -> Option<TokenId> {
        let pos = self.insertion_point();
        let before = pos.checked_sub(1).and_then(|p| self.atom_at(p));
        [before, self.atom_at(pos)].into_iter().find_map(|atom| match atom {
            Some(Atom::Token(t)) => Some(t.id),
            _ => None,
        })
    }

    pub fn atom_at(&self, pos: usize) -> Option<Atom<'_>> {
        let mut acc = 0;
        for seg in &self.segments {
            let n = seg.atoms();
            if pos < acc + n {
                return match seg {
                    Segment::Text(s) => s.chars().nth(pos - acc).map(Atom::Char),
                    Segment::Token(t) => Some(Atom::Token(t)),
                };
            }
            acc += n;
        }
        None
    }

    /// Flatten to the single string the agent parses
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(s) => out.push_str(s),
                Segment::Token(t) => out.push_str(&t.encoding()),
            }
        }
        out.trim().to_string()
    }

    fn delete_atom(&mut self, pos: usize) {
        let token_id = match self.atom_at(pos) {
            Some(Atom::Token(t)) => Some(t.id),
            Some(Atom::Char(_)) => None,
            None => return,
        };

        if let Some(id) = token_id {
            // remove_token shifts the caret itself; callers set it afterwards
            let caret = self.caret;
            self.remove_token(id);
            self.caret = caret;
            return;
        }

        let idx = self.split_at(pos);
        if let Some(Segment::Text(s)) = self.segments.get_mut(idx) {
            let first = s.chars().next().map_or(0, char::len_utf8);
            s.drain(..first);
        }
        self.normalize();
    }

    /// Make `pos` a segment boundary and return the index of the segment
    /// starting there. Only text runs are ever split.
    fn split_at(&mut self, pos: usize) -> usize {
        let mut acc = 0;
        for i in 0..self.segments.len() {
            if pos == acc {
                return i;
            }
            let n = self.segments[i].atoms();
            if pos < acc + n {
                if let Segment::Text(s) = &mut self.segments[i] {
                    let byte = s
                        .char_indices()
                        .nth(pos - acc)
                        .map_or(s.len(), |(b, _)| b);
                    let tail = s.split_off(byte);
                    self.segments.insert(i + 1, Segment::Text(tail));
                    return i + 1;
                }
            }
            acc += n;
        }
        self.segments.len()
    }

    /// Merge adjacent text runs and drop empty ones
    fn normalize(&mut self) {
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for seg in self.segments.drain(..) {
            match seg {
                Segment::Text(s) if s.is_empty() => {}
                Segment::Text(s) => {
                    if let Some(Segment::Text(prev)) = merged.last_mut() {
                        prev.push_str(&s);
                    } else {
                        merged.push(Segment::Text(s));
                    }
                }
                token => merged.push(token),
            }
        }
        self.segments = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB: &str = r#"{"url":"x.com"}"#;

    #[test]
    fn test_scenario_text_token_text() {
        let mut doc = GoalDocument::new();
        doc.insert_text("Summarize ");
        doc.insert_token("Fetch", "web", WEB);
        doc.insert_text(" please");
        assert_eq!(doc.serialize(), r#"Summarize web{"url":"x.com"} please"#);
    }

    #[test]
    fn test_empty_document() {
        let doc = GoalDocument::new();
        assert_eq!(doc.serialize(), "");
        assert!(doc.is_blank());
    }

    #[test]
    fn test_whitespace_only_is_blank() {
        let mut doc = GoalDocument::new();
        doc.insert_text("  \n\t ");
        assert!(doc.is_blank());
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_tokens_only() {
        let mut doc = GoalDocument::new();
        doc.insert_token("a", "web", WEB);
        doc.insert_token("b", "messages", "{}");
        assert_eq!(doc.serialize(), r#"web{"url":"x.com"}messages{}"#);
    }

    #[test]
    fn test_insert_mid_text_splits_run() {
        let mut doc = GoalDocument::new();
        doc.insert_text("hello world");
        doc.set_caret(5);
        let id = doc.insert_token("t", "cat", "{}");

        assert_eq!(doc.segments().len(), 3);
        assert_eq!(doc.segments()[0], Segment::Text("hello".into()));
        assert!(matches!(&doc.segments()[1], Segment::Token(t) if t.id == id));
        assert_eq!(doc.segments()[2], Segment::Text(" world".into()));
        assert_eq!(doc.caret(), Some(6));
    }

    #[test]
    fn test_typing_after_token_is_plain_text() {
        let mut doc = GoalDocument::new();
        doc.insert_text("ab");
        doc.set_caret(1);
        doc.insert_token("t", "cat", "{}");
        doc.insert_text("X");
        assert_eq!(doc.serialize(), "acat{}Xb");
    }

    #[test]
    fn test_token_never_split() {
        let mut doc = GoalDocument::new();
        let first = doc.insert_token("t1", "a", "{1}");
        doc.set_caret(0);
        doc.insert_token("t2", "b", "{2}");
        doc.set_caret(2);
        doc.insert_token("t3", "c", "{3}");

        let ids: Vec<_> = doc.tokens().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], first);
        assert_eq!(doc.serialize(), "b{2}a{1}c{3}");
        assert!(doc.tokens().all(|t| t.serialized_data.len() == 3));
    }

    #[test]
    fn test_remove_token_is_local() {
        let mut doc = GoalDocument::new();
        doc.insert_text("Summarize ");
        let web = doc.insert_token("Fetch", "web", WEB);
        doc.insert_text(" and ");
        doc.insert_token("Mail", "mail", r#"{"to":"me"}"#);
        doc.insert_text(" please");

        let before = doc.serialize();
        assert!(doc.remove_token(web));
        let after = doc.serialize();

        assert_eq!(after, before.replacen(r#"web{"url":"x.com"}"#, "", 1));
        assert_eq!(doc.tokens().count(), 1);
        assert_eq!(doc.segments()[0], Segment::Text("Summarize  and ".into()));
    }

    #[test]
    fn test_remove_unknown_token() {
        let mut doc = GoalDocument::new();
        doc.insert_text("x");
        assert!(!doc.remove_token(42));
        assert_eq!(doc.serialize(), "x");
    }

    #[test]
    fn test_remove_shifts_caret() {
        let mut doc = GoalDocument::new();
        let id = doc.insert_token("t", "cat", "{}");
        doc.insert_text("abc");
        assert_eq!(doc.caret(), Some(4));
        doc.remove_token(id);
        assert_eq!(doc.caret(), Some(3));
    }

    #[test]
    fn test_backspace_removes_token_as_unit() {
        let mut doc = GoalDocument::new();
        doc.insert_text("a");
        doc.insert_token("t", "cat", r#"{"k":1}"#);
        doc.backspace();
        assert_eq!(doc.serialize(), "a");
        assert_eq!(doc.caret(), Some(1));
        doc.backspace();
        assert_eq!(doc.serialize(), "");
        doc.backspace();
        assert_eq!(doc.caret(), Some(0));
    }

    #[test]
    fn test_delete_forward() {
        let mut doc = GoalDocument::new();
        doc.insert_text("ab");
        doc.insert_token("t", "cat", "{}");
        doc.set_caret(1);
        doc.delete();
        assert_eq!(doc.serialize(), "acat{}");
        doc.delete();
        assert_eq!(doc.serialize(), "a");
        assert_eq!(doc.caret(), Some(1));
    }

    #[test]
    fn test_multibyte_text_split() {
        let mut doc = GoalDocument::new();
        doc.insert_text("Привет мир");
        doc.set_caret(6);
        doc.insert_token("t", "msg", "{}");
        assert_eq!(doc.serialize(), "Приветmsg{} мир");
        doc.move_left();
        doc.backspace();
        assert_eq!(doc.serialize(), "Привеmsg{} мир");
    }

    #[test]
    fn test_line_breaks_are_text() {
        let mut doc = GoalDocument::new();
        doc.insert_text("line one\n");
        doc.insert_token("t", "cat", "{}");
        doc.insert_text("\nline two\n");
        assert_eq!(doc.serialize(), "line one\ncat{}\nline two");
        assert_eq!(doc.segments().len(), 3);
    }

    #[test]
    fn test_clear_resets() {
        let mut doc = GoalDocument::new();
        doc.insert_token("t", "cat", "{}");
        doc.clear();
        assert!(doc.is_empty());
        assert_eq!(doc.caret(), None);
    }

    #[test]
    fn test_insert_transfer() {
        let mut doc = GoalDocument::new();
        let t = ToolTransfer::new("web", WEB, "Fetch");
        doc.insert_transfer(&t);
        let token = doc.tokens().next().unwrap();
        assert_eq!(token.display_name, "Fetch");
        assert_eq!(token.encoding(), r#"web{"url":"x.com"}"#);
    }

    #[test]
    fn test_pill_at_caret_prefers_left_neighbour() {
        let mut doc = GoalDocument::new();
        let a = doc.insert_token("a", "cat", "{}");
        let b = doc.insert_token("b", "cat", "{}");
        doc.insert_text(" tail");

        doc.set_caret(2);
        assert_eq!(doc.pill_at_caret(), Some(b));
        doc.set_caret(0);
        assert_eq!(doc.pill_at_caret(), Some(a));
        doc.set_caret(4);
        assert_eq!(doc.pill_at_caret(), None);
    }
}
