//! Shared normalization for author-supplied gap text.
//!
//! The exact same pipeline runs in the authoring preview, the gap extractor
//! and the grading path. Any divergence silently breaks grading, so this is
//! one pure function with no knobs.

/// Entities the authoring surface is known to emit. Decoded in this order.
const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// Normalize author-supplied rich text down to comparable plain text.
///
/// Pipeline, order matters: remove the `*` correct-candidate marker, decode
/// the fixed entity set, strip HTML tags (tolerating tags cut off at either
/// end of the string), trim surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.replace('*', "");

    for (entity, plain) in ENTITIES {
        text = text.replace(entity, plain);
    }

    // Strip tags until no angle bracket survives. A `<` with no closing `>`
    // is a tag cut off at the end of the string; a `>` before any `<` is the
    // tail of a tag opened before the string started.
    loop {
        match (text.find('<'), text.find('>')) {
            (Some(open), Some(close)) if open < close => {
                text.replace_range(open..=close, "");
            }
            (_, Some(close)) => {
                text.replace_range(..=close, "");
            }
            (Some(open), None) => {
                text.truncate(open);
            }
            (None, None) => break,
        }
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_correct_markers() {
        assert_eq!(normalize("blue*"), "blue");
        assert_eq!(normalize("*azure"), "azure");
        assert_eq!(normalize("cy*an"), "cyan");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(normalize("a&nbsp;b"), "a b");
        assert_eq!(normalize("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(normalize("it&#39;s"), "it's");
        assert_eq!(normalize("a&amp;b"), "a&b");
    }

    #[test]
    fn strips_tags() {
        assert_eq!(normalize("<b>bold</b>"), "bold");
        assert_eq!(normalize("<span style=\"x\">text</span>"), "text");
        assert_eq!(normalize("a<br/>b"), "ab");
    }

    #[test]
    fn strips_tags_cut_off_at_boundaries() {
        assert_eq!(normalize("pan>leading tail"), "leading tail");
        assert_eq!(normalize("trailing open<spa"), "trailing open");
        assert_eq!(normalize("le>mid<dle"), "mid");
    }

    #[test]
    fn decoded_angle_brackets_are_stripped_too() {
        // &lt;b&gt; decodes to a real tag and is removed by the tag pass
        assert_eq!(normalize("&lt;b&gt;word&lt;/b&gt;"), "word");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize("  answer  "), "answer");
        assert_eq!(normalize(" &nbsp; answer &nbsp; "), "answer");
    }

    #[test]
    fn idempotent_on_plain_and_marked_up_text() {
        for raw in [
            "plain answer",
            "<p>rich *answer*</p>",
            " spaced &nbsp; out ",
            "pan>broken<spa",
            "",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<p></p>"), "");
    }
}
