//! `data:` URI helpers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parses `data:[<mime>][;base64],<payload>`. Returns `None` for anything else, including
    /// invalid base64.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mut params = meta.split(';');
        let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));
        let bytes = if is_base64 {
            let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD.decode(compact).ok()?
        } else {
            percent_decode_str(payload).collect()
        };
        Some(Self {
            mime: if mime.is_empty() {
                "text/plain".to_string()
            } else {
                mime
            },
            bytes,
        })
    }

    pub fn is_svg(&self) -> bool {
        self.mime == "image/svg+xml"
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_and_plain_payloads() {
        let uri = encode_data_uri("image/png", b"\x89PNG");
        let parsed = DataUri::parse(&uri).unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.bytes, b"\x89PNG");

        let svg = DataUri::parse("data:image/svg+xml,%3Csvg%2F%3E").unwrap();
        assert!(svg.is_svg());
        assert_eq!(svg.bytes, b"<svg/>");

        assert!(DataUri::parse("/covers/a.jpg").is_none());
        assert!(DataUri::parse("data:image/png;base64,@@@").is_none());
    }
}
