//! JSON output formatting.

use super::Resolution;
use std::io::{self, Write};

/// Write a resolution as pretty-printed JSON.
pub fn write_json<W: Write>(out: &mut W, record: &Resolution) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, record)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample;

    #[test]
    fn test_json_fields() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample(true)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["mac"], "3e:50:6e:54:28:3d");
        assert_eq!(value["ip"], "10.18.6.18");
        assert_eq!(value["source"], "cache");
        assert_eq!(value["interface"], "eth0");
        assert_eq!(value["elapsed_ms"], 1234);
        assert!(value["resolved_at"].is_string());
    }
}
