use std::fmt;

/// Longest prefix of a raw message shown in a log line.
const MAX_SHOWN: usize = 256;

/// Displays an undecodable message for a log line.
///
/// UTF-8 input is shown as an escaped string, anything else as hex.
/// Output is capped at 256 bytes of input plus a byte count.
pub struct RawMessage<'a>(pub &'a [u8]);

impl fmt::Display for RawMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(MAX_SHOWN)];
        match std::str::from_utf8(shown) {
            Ok(text) => write!(f, "{text:?}")?,
            // The cap fell inside a multi-byte character: show the text before it.
            Err(e) if e.error_len().is_none() => {
                let text = std::str::from_utf8(&shown[..e.valid_up_to()]).unwrap_or_default();
                write!(f, "{text:?}")?
            }
            Err(_) => {
                for byte in shown {
                    write!(f, "{byte:02x}")?;
                }
            }
        }
        if self.0.len() > MAX_SHOWN {
            write!(f, "... ({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}
