//! Keyboard filtering for the jump input
//!
//! The game shares its page with forms, so key handling lives on the window
//! but steps aside whenever the user is typing somewhere.

/// `KeyboardEvent.code` values that make the player jump
pub const JUMP_KEYS: [&str; 3] = ["Space", "ArrowUp", "KeyW"];

/// Tags whose elements take text input
const EDITABLE_TAGS: [&str; 3] = ["INPUT", "TEXTAREA", "SELECT"];

/// The element a key event was dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyTarget<'a> {
    /// `Element.tagName` (upper case for HTML documents)
    pub tag: &'a str,
    /// `HTMLElement.isContentEditable`
    pub content_editable: bool,
}

impl KeyTarget<'_> {
    pub fn is_editable(&self) -> bool {
        self.content_editable
            || EDITABLE_TAGS
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(self.tag))
    }
}

/// Whether a key press should be taken (and its default suppressed) as a jump
pub fn captures_jump_key(code: &str, target: Option<KeyTarget<'_>>) -> bool {
    JUMP_KEYS.contains(&code) && !target.is_some_and(|t| t.is_editable())
}
