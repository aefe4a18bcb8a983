use encoding::{DecoderTrap, EncoderTrap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Character set of the server console streams.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    ASCII,
    #[default]
    UTF8,
    UTF16LE,
    UTF16BE,
    GBK,
    GB18030,
    HZ,
    BIG5_2003,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown encoding: {0}")]
pub struct UnknownEncoding(pub String);

fn map_encoding(encoding: &Encoding) -> encoding::EncodingRef {
    match encoding {
        Encoding::ASCII => encoding::all::ASCII,
        Encoding::UTF8 => encoding::all::UTF_8,
        Encoding::UTF16LE => encoding::all::UTF_16LE,
        Encoding::UTF16BE => encoding::all::UTF_16BE,
        Encoding::GBK => encoding::all::GBK,
        Encoding::GB18030 => encoding::all::GB18030,
        Encoding::HZ => encoding::all::HZ,
        Encoding::BIG5_2003 => encoding::all::BIG5_2003,
    }
}

static STR2ENCODING_MAP: LazyLock<HashMap<&'static str, Encoding>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("ascii", Encoding::ASCII);
    map.insert("utf-8", Encoding::UTF8);
    map.insert("utf-16le", Encoding::UTF16LE);
    map.insert("utf-16be", Encoding::UTF16BE);
    map.insert("gbk", Encoding::GBK);
    map.insert("gb18030", Encoding::GB18030);
    map.insert("hz", Encoding::HZ);
    map.insert("big5-2003", Encoding::BIG5_2003);
    map
});

impl Encoding {
    pub fn get(&self) -> encoding::EncodingRef {
        map_encoding(self)
    }

    pub fn name(&self) -> &'static str {
        self.get().name()
    }

    /// Decodes console bytes, replacing invalid sequences.
    pub fn decode(&self, bytes: &[u8]) -> String {
        // 控制台输出不可靠, 非法字节一律替换而不是报错
        match self.get().decode(bytes, DecoderTrap::Replace) {
            Ok(text) => text,
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Bytes of one encoded `\n`.
    pub fn newline(&self) -> &'static [u8] {
        match self {
            Self::UTF16LE => b"\n\0",
            Self::UTF16BE => b"\0\n",
            _ => b"\n",
        }
    }

    /// Removes the first complete line, terminator included, from the front of `buf`.
    ///
    /// UTF-16 newlines only count on code unit boundaries. The other encodings never use
    /// the `\n` byte inside a multibyte sequence.
    pub fn take_line(&self, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
        let newline = self.newline();
        let end = buf
            .chunks_exact(newline.len())
            .position(|unit| unit == newline)
            .map(|pos| (pos + 1) * newline.len())?;
        Some(buf.drain(..end).collect())
    }

    /// Encodes text for the server's stdin, replacing unmappable characters.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self.get().encode(text, EncoderTrap::Replace) {
            Ok(bytes) => bytes,
            Err(_) => text.as_bytes().to_vec(),
        }
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STR2ENCODING_MAP
            .get(s.trim().to_ascii_lowercase().as_str())
            .cloned()
            .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

// 自定义序列化
impl Serialize for Encoding {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

// 自定义反序列化
impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoding_name = String::deserialize(deserializer)?;
        encoding_name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_encodings() -> Vec<Encoding> {
        Vec::from_iter(STR2ENCODING_MAP.values().cloned())
    }

    #[test]
    fn str_to_encoding_map_test() {
        for encoding in get_encodings() {
            assert_eq!(&encoding, STR2ENCODING_MAP.get(encoding.name()).unwrap());
        }
    }

    #[test]
    fn encoding_deserialize_test() {
        for encoding in get_encodings() {
            let serialized = serde_json::to_string(&encoding).unwrap();
            assert_eq!(serialized, format!("\"{}\"", encoding.name()));
            let deserialized: Encoding = serde_json::from_str(&serialized).unwrap();
            assert_eq!(deserialized, encoding);
        }
        assert!(serde_json::from_str::<Encoding>("\"klingon\"").is_err());
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!("GBK".parse::<Encoding>(), Ok(Encoding::GBK));
        assert_eq!(" utf-8 ".parse::<Encoding>(), Ok(Encoding::UTF8));
        assert_eq!(
            "latin-9".parse::<Encoding>(),
            Err(UnknownEncoding("latin-9".into()))
        );
    }

    #[test]
    fn decode_replaces_invalid_bytes() {
        let text = Encoding::UTF8.decode(b"Steve \xff joined");
        assert!(text.starts_with("Steve "));
        assert!(text.ends_with(" joined"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn utf16_lines_split_on_code_units() {
        // 'Ċ' is U+010A, its low byte is the ASCII newline
        let mut buf = Encoding::UTF16LE.encode("Ċa\r\nb\n");
        buf.extend_from_slice(&Encoding::UTF16LE.encode("tail")[..5]);

        let line = Encoding::UTF16LE.take_line(&mut buf).unwrap();
        assert_eq!(Encoding::UTF16LE.decode(&line), "Ċa\r\n");
        let line = Encoding::UTF16LE.take_line(&mut buf).unwrap();
        assert_eq!(Encoding::UTF16LE.decode(&line), "b\n");
        assert_eq!(Encoding::UTF16LE.take_line(&mut buf), None);
        assert_eq!(buf.len(), 5);

        let mut buf = Encoding::UTF16BE.encode("\u{0A00}x\ny");
        let line = Encoding::UTF16BE.take_line(&mut buf).unwrap();
        assert_eq!(Encoding::UTF16BE.decode(&line), "\u{0A00}x\n");
        assert_eq!(Encoding::UTF16BE.decode(&buf), "y");
    }

    #[test]
    fn byte_oriented_lines() {
        let mut buf = Encoding::GBK.encode("服务器\n启动\n");
        let line = Encoding::GBK.take_line(&mut buf).unwrap();
        assert_eq!(Encoding::GBK.decode(&line), "服务器\n");
        let line = Encoding::GBK.take_line(&mut buf).unwrap();
        assert_eq!(Encoding::GBK.decode(&line), "启动\n");
        assert!(buf.is_empty());
        assert_eq!(Encoding::UTF8.take_line(&mut buf), None);
    }

    #[test]
    fn gbk_round_trip() {
        let bytes = Encoding::GBK.encode("服务器");
        assert_ne!(bytes, "服务器".as_bytes());
        assert_eq!(Encoding::GBK.decode(&bytes), "服务器");
    }
}
