//! CSV output formatting.

use super::Resolution;
use std::io::{self, Write};

/// Write a resolution as a CSV header plus one row.
pub fn write_csv<W: Write>(out: &mut W, record: &Resolution) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["mac", "ip", "source", "interface", "elapsed_ms", "resolved_at"])?;
    wtr.write_record([
        &record.mac.to_string(),
        &record.ip.to_string(),
        &record.source.to_string(),
        &record.interface,
        &record.elapsed_ms.to_string(),
        &record.resolved_at.to_rfc3339(),
    ])?;

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample;

    #[test]
    fn test_csv_row() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("mac,ip,source,interface,elapsed_ms,resolved_at")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("3e:50:6e:54:28:3d,10.18.6.18,probe,eth0,1234,"));
        assert_eq!(lines.next(), None);
    }
}
