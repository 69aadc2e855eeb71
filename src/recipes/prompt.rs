//! Short display prompts derived from full step instructions

/// Delimiters tried in order when looking for a natural cut point
const CUT_POINTS: [char; 4] = ['.', '—', ';', ','];

/// A cut point must sit strictly after this character position
const MIN_CUT: usize = 18;

/// A cut point must sit strictly before this character position
const MAX_CUT: usize = 70;

/// Longest text returned without truncation
const MAX_PROMPT_CHARS: usize = 64;

/// Marker appended to truncated prompts
pub const ELLIPSIS: char = '…';

/// Derive a short display prompt from a full instruction.
///
/// The first occurrence of each delimiter is checked in the order
/// `.`, `—`, `;`, `,`; the first one landing strictly between character
/// positions 18 and 70 becomes the cut. Without a usable cut the text is
/// returned as-is when it fits in 64 characters, otherwise truncated to
/// 64 characters with an ellipsis.
#[must_use]
pub fn derive_prompt(full: &str) -> String {
    let text = full.trim();

    for delimiter in CUT_POINTS {
        let Some((position, byte_index)) = text
            .char_indices()
            .enumerate()
            .find_map(|(position, (byte_index, c))| (c == delimiter).then_some((position, byte_index)))
        else {
            continue;
        };

        if position > MIN_CUT && position < MAX_CUT {
            return text[..byte_index].trim_end().to_string();
        }
    }

    if text.chars().count() <= MAX_PROMPT_CHARS {
        return text.to_string();
    }

    let head: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    format!("{}{ELLIPSIS}", head.trim_end())
}
