//! Property tests for the encoders and header rendering.

#![allow(clippy::unwrap_used)]

use mailforge_mime::Headers;
use mailforge_mime::encoding::{
    decode_quoted_printable, decode_rfc2047, encode_quoted_printable, encode_rfc2047,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_quoted_printable_lines_fit(
        data in prop::collection::vec(any::<u8>().prop_filter("no line breaks", |b| *b != b'\n' && *b != b'\r'), 0..400)
    ) {
        let encoded = encode_quoted_printable(&data);
        for line in encoded.split("\r\n") {
            prop_assert!(line.len() <= 76, "line too long: {line:?}");
        }
        prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), data);
    }

    #[test]
    fn prop_rfc2047_words_fit(text in "\\PC{0,120}") {
        let encoded = encode_rfc2047(&text, "utf-8").unwrap();
        if encoded != text {
            for word in encoded.split(' ') {
                prop_assert!(word.len() <= 75, "encoded word too long: {word}");
            }
        }
        prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
    }

    #[test]
    fn prop_folded_header_lines_fit(
        name in "X-[A-Za-z]{1,10}",
        words in prop::collection::vec("[a-z]{1,20}", 1..30),
    ) {
        let mut headers = Headers::new();
        headers.add(name.as_str(), words.join(" ")).unwrap();

        let rendered = headers.to_string();
        prop_assert!(rendered.ends_with("\r\n"));
        for line in rendered.trim_end_matches("\r\n").split("\r\n") {
            prop_assert!(line.len() <= 76, "line too long: {line:?}");
        }
        let unfolded = rendered.trim_end_matches("\r\n").replace("\r\n ", " ");
        prop_assert_eq!(unfolded, format!("{name}: {}", words.join(" ")));
    }
}
