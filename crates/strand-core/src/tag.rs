//! Inline think-tag recognizer.
//!
//! Local reasoning models interleave hidden chain-of-thought with their
//! visible answer using literal `<think>` / `</think>` sentinels.  This
//! module separates the two as the content streams in, with no regex: the
//! sentinel boundary must be observable per character so that a sentinel
//! split across two reads survives intact.
//!
//! The parser is fed decoded content chunks in arrival order.  State and any
//! partial sentinel match persist across chunks; segment text does not — it
//! is emitted at the end of every [`ThinkTagParser::push`] call.

use crate::types::ProviderEvent;

/// Opening sentinel.  Matching is exact and case-sensitive.
const OPEN_TAG: &str = "<think>";

/// Closing sentinel.
const CLOSE_TAG: &str = "</think>";

/// Recognizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagState {
    /// Emitting visible text.
    Outside,
    /// Saw a `<` outside; accumulating a possible open sentinel.
    MaybeOpen,
    /// Emitting thinking text.
    Inside,
    /// Saw a `<` inside; accumulating a possible close sentinel.
    MaybeClose,
}

/// Incremental classifier for `<think>`-bracketed content.
///
/// One parser instance covers one provider turn: create it when the turn
/// starts, call [`push`](Self::push) per content delta, and
/// [`finish`](Self::finish) at end of turn to flush a dangling half-open
/// sentinel.
#[derive(Debug)]
pub struct ThinkTagParser {
    state: TagState,
    /// Partial sentinel match, leading `<` included.  Never grows past the
    /// close sentinel length.
    partial: String,
    /// Pending visible text for the current chunk.
    visible: String,
    /// Pending thinking text for the current chunk.
    thinking: String,
}

impl Default for ThinkTagParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkTagParser {
    /// Create a parser positioned outside any sentinel.
    pub fn new() -> Self {
        Self {
            state: TagState::Outside,
            partial: String::with_capacity(CLOSE_TAG.len()),
            visible: String::new(),
            thinking: String::new(),
        }
    }

    /// Feed one content chunk and return the events it completes, in input
    /// order.  A chunk that only extends a partial sentinel returns nothing.
    pub fn push(&mut self, chunk: &str) -> Vec<ProviderEvent> {
        let mut out = Vec::new();
        for ch in chunk.chars() {
            self.step(ch, &mut out);
        }
        // Segment buffers do not survive the chunk boundary; the partial
        // sentinel accumulator does.
        self.flush_visible(&mut out);
        self.flush_thinking(&mut out);
        out
    }

    /// End of turn: a pending half-open sentinel is emitted as part of the
    /// segment that surrounds it.
    pub fn finish(&mut self) -> Vec<ProviderEvent> {
        let mut out = Vec::new();
        match self.state {
            TagState::MaybeOpen => {
                let partial = std::mem::take(&mut self.partial);
                self.visible.push_str(&partial);
                self.state = TagState::Outside;
            }
            TagState::MaybeClose => {
                let partial = std::mem::take(&mut self.partial);
                self.thinking.push_str(&partial);
                self.state = TagState::Inside;
            }
            TagState::Outside | TagState::Inside => {}
        }
        self.flush_visible(&mut out);
        self.flush_thinking(&mut out);
        out
    }

    /// Advance the machine by one character.
    fn step(&mut self, ch: char, out: &mut Vec<ProviderEvent>) {
        match self.state {
            TagState::Outside => {
                if ch == '<' {
                    self.flush_visible(out);
                    self.partial.push('<');
                    self.state = TagState::MaybeOpen;
                } else {
                    self.visible.push(ch);
                }
            }

            TagState::MaybeOpen => {
                self.partial.push(ch);
                if self.partial == OPEN_TAG {
                    self.partial.clear();
                    self.state = TagState::Inside;
                } else if !OPEN_TAG.starts_with(self.partial.as_str()) {
                    // Dead start: everything before this character is
                    // literal visible text; the character itself is
                    // re-dispatched from Outside so `<<` restarts a match.
                    self.partial.pop();
                    let dead = std::mem::take(&mut self.partial);
                    self.visible.push_str(&dead);
                    self.state = TagState::Outside;
                    self.step(ch, out);
                }
            }

            TagState::Inside => {
                if ch == '<' {
                    self.flush_thinking(out);
                    self.partial.push('<');
                    self.state = TagState::MaybeClose;
                } else {
                    self.thinking.push(ch);
                }
            }

            TagState::MaybeClose => {
                self.partial.push(ch);
                if self.partial == CLOSE_TAG {
                    self.partial.clear();
                    self.state = TagState::Outside;
                } else if !CLOSE_TAG.starts_with(self.partial.as_str()) {
                    self.partial.pop();
                    let dead = std::mem::take(&mut self.partial);
                    self.thinking.push_str(&dead);
                    self.state = TagState::Inside;
                    self.step(ch, out);
                }
            }
        }
    }

    fn flush_visible(&mut self, out: &mut Vec<ProviderEvent>) {
        if !self.visible.is_empty() {
            out.push(ProviderEvent::TextDelta {
                content: std::mem::take(&mut self.visible),
            });
        }
    }

    fn flush_thinking(&mut self, out: &mut Vec<ProviderEvent>) {
        if !self.thinking.is_empty() {
            out.push(ProviderEvent::Thinking {
                content: std::mem::take(&mut self.thinking),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
