//! Plain-text tables and human-readable values for command output.

/// Column-aligned text table.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn render(&self) -> String {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for line in std::iter::once(&self.headers).chain(&self.rows) {
            for (i, cell) in line.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        for line in std::iter::once(&self.headers).chain(&self.rows) {
            let rendered: Vec<String> = line
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
                .collect();
            out.push_str(rendered.join("  ").trim_end());
            out.push('\n');
        }
        out
    }
}

/// Decimal (SI) byte size: `256 MB`, `1.5 kB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if value.fract() == 0.0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Unix seconds as `02 Jan 06 15:04 UTC`.
pub fn format_unix_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%d %b %y %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_aligns_columns() {
        let mut table = Table::new(["NAME", "ID"]);
        table.row(["api", "abc123"]);
        table.row(["billing-service", "x"]);
        assert_eq!(
            table.render(),
            "NAME             ID\napi              abc123\nbilling-service  x\n"
        );
    }

    #[test]
    fn test_empty_table_prints_headers() {
        let table = Table::new(["SHA256 ID", "SIZE"]);
        assert_eq!(table.render(), "SHA256 ID  SIZE\n");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(999), "999 B");
        assert_eq!(human_bytes(1500), "1.5 kB");
        assert_eq!(human_bytes(256_000_000), "256 MB");
        assert_eq!(human_bytes(3_008_000_000), "3.0 GB");
    }

    #[test]
    fn test_format_unix_time() {
        assert_eq!(format_unix_time(0), "01 Jan 70 00:00 UTC");
        assert_eq!(format_unix_time(1_700_000_000), "14 Nov 23 22:13 UTC");
    }
}
