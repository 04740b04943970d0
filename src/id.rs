// Copyright 2024 melonfire-sync contributors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! Logical-id <-> document-key codec.
//!
//! Logical row ids may contain characters forbidden in remote document
//! keys (`/`, among others). Percent-encoding is applied symmetrically:
//! encode on write and on lookup-by-id, decode on read-back. The record's
//! embedded `id` field always stores the logical, un-encoded form.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters a remote document key must not contain, beyond the control
/// characters: the path separator and the handful of characters that are
/// meaningful to typical document-store path syntax.
const KEY_UNSAFE: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'#')
    .add(b'?')
    .add(b'%')
    .add(b' ')
    .add(b':');

/// Encode a logical row id into a string that is safe to use as a document
/// key segment.
pub fn encode_id(logical_id: &str) -> String {
    utf8_percent_encode(logical_id, KEY_UNSAFE).to_string()
}

/// Decode a document key segment back into the logical row id. Invalid
/// percent-sequences are passed through byte-for-byte via lossy UTF-8
/// decoding rather than failing the read, since this only ever runs over
/// keys this crate itself produced.
pub fn decode_id(encoded_id: &str) -> String {
    percent_decode_str(encoded_id)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_ids() {
        for id in ["aaa", "bbb123", "row-with-dashes"] {
            assert_eq!(decode_id(&encode_id(id)), id);
        }
    }

    #[test]
    fn round_trips_key_unsafe_characters() {
        let id = "https://rss.art19.com/smartless-gid://art19-episode-locator";
        let encoded = encode_id(id);
        assert!(!encoded.contains('/'));
        assert_eq!(decode_id(&encoded), id);
    }

    #[test]
    fn round_trips_hash_and_colon() {
        let id = "a/b#c:d%e";
        assert_eq!(decode_id(&encode_id(id)), id);
    }

    #[test]
    fn encoding_is_injective_for_distinct_ids() {
        let a = encode_id("a/b");
        let b = encode_id("a#b");
        assert_ne!(a, b);
    }
}
