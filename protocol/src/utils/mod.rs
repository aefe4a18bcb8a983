mod encoding;

pub use self::encoding::{Encoding, UnknownEncoding};
