//! Lightweight markdown → HTML conversion for agent messages, and the
//! splitting of the result into reveal units for the typing animation.
//!
//! A reveal never splits a tag (`<strong>`) or an entity (`&lt;`) across
//! two steps; everything else is revealed one character at a time.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").expect("valid italic regex"));
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\*[ \t]+(.*)$").expect("valid bullet regex"));

/// Escape the three characters that would otherwise be read as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert the small markdown subset agents use: `**bold**`, `*italic*`,
/// `* bullet` lines and newlines.
pub fn markdown_to_html(text: &str) -> String {
    let escaped = escape_html(text);
    let bulleted = BULLET.replace_all(&escaped, "<ul><li>$1</li></ul>");
    let bold = BOLD.replace_all(&bulleted, "<strong>$1</strong>");
    let italic = ITALIC.replace_all(&bold, "<em>$1</em>");
    italic.replace("\r\n", "\n").replace('\n', "<br>")
}

/// One atomic step of a reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit<'a> {
    /// A complete tag such as `<strong>` or `</li>`.
    Tag(&'a str),
    /// A complete character entity such as `&amp;`.
    Entity(&'a str),
    /// A single character.
    Char(&'a str),
}

impl<'a> Unit<'a> {
    pub fn as_str(&self) -> &'a str {
        match *self {
            Unit::Tag(s) | Unit::Entity(s) | Unit::Char(s) => s,
        }
    }
}

/// Split `html` into reveal units. Concatenating the units yields `html`.
pub fn reveal_units(html: &str) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    let mut i = 0;
    while i < html.len() {
        let rest = &html[i..];
        let Some(c) = rest.chars().next() else { break };
        let len = match c {
            '<' => rest.find('>').map(|end| end + 1),
            '&' => rest
                .find(';')
                .filter(|&end| end > 1 && rest[1..end].chars().all(|c| c.is_ascii_alphanumeric() || c == '#')),
            _ => None,
        };
        match (c, len) {
            ('<', Some(n)) => {
                units.push(Unit::Tag(&rest[..n]));
                i += n;
            }
            ('&', Some(n)) => {
                units.push(Unit::Entity(&rest[..n + 1]));
                i += n + 1;
            }
            _ => {
                let n = c.len_utf8();
                units.push(Unit::Char(&rest[..n]));
                i += n;
            }
        }
    }
    units
}

/// Decode the entities produced by [`escape_html`].
pub fn decode_entity(entity: &str) -> &str {
    match entity {
        "&amp;" => "&",
        "&lt;" => "<",
        "&gt;" => ">",
        "&quot;" => "\"",
        "&#39;" => "'",
        other => other,
    }
}

/// Strip tags and decode entities; used where only plain text fits.
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for unit in reveal_units(html) {
        match unit {
            Unit::Tag("<br>") => out.push('\n'),
            Unit::Tag("<li>") => out.push_str("• "),
            Unit::Tag(_) => {}
            Unit::Entity(e) => out.push_str(decode_entity(e)),
            Unit::Char(c) => out.push_str(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("**bold** move", "<strong>bold</strong> move")]
    #[case("an *aside*", "an <em>aside</em>")]
    #[case("line one\nline two", "line one<br>line two")]
    #[case("* first\n* second", "<ul><li>first</li></ul><br><ul><li>second</li></ul>")]
    #[case("a < b & c", "a &lt; b &amp; c")]
    fn converts_markdown(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(markdown_to_html(input), expected);
    }

    #[test]
    fn units_keep_tags_whole() {
        let units = reveal_units("<strong>hi</strong>!");
        assert_eq!(
            units,
            vec![
                Unit::Tag("<strong>"),
                Unit::Char("h"),
                Unit::Char("i"),
                Unit::Tag("</strong>"),
                Unit::Char("!"),
            ]
        );
    }

    #[test]
    fn units_keep_entities_whole() {
        let units = reveal_units("a&lt;b");
        assert_eq!(units, vec![Unit::Char("a"), Unit::Entity("&lt;"), Unit::Char("b")]);
    }

    #[test]
    fn stray_ampersand_and_angle_are_chars() {
        let units = reveal_units("x & y <");
        assert!(units.iter().all(|u| matches!(u, Unit::Char(_))));
        assert_eq!(units.len(), 7);
    }

    #[test]
    fn units_concatenate_back() {
        let html = markdown_to_html("**Costs** matter\n* 한국어 *test* & more");
        let joined: String = reveal_units(&html).iter().map(|u| u.as_str()).collect();
        assert_eq!(joined, html);
    }

    #[test]
    fn multibyte_chars_are_single_units() {
        let units = reveal_units("한국");
        assert_eq!(units, vec![Unit::Char("한"), Unit::Char("국")]);
    }

    #[test]
    fn plain_text_round_trip() {
        let html = markdown_to_html("**Rates** < 5%\n* hold");
        assert_eq!(to_plain_text(&html), "Rates < 5%\n• hold");
    }
}
