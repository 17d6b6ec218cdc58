use std::fmt::{Display, Formatter};

/// Plain-text table with a title. The first column is left-aligned, the rest
/// right-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|header| (*header).to_owned()).collect(),
            rows: Vec::new(),
        }
    }

    /// Two-column label/value table.
    pub fn key_value(title: impl Into<String>) -> Self {
        Self::new(title, &["", ""])
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn push_pair(&mut self, label: &str, value: impl Into<String>) {
        self.rows.push(vec![label.to_owned(), value.into()]);
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        (0..columns)
            .map(|column| {
                std::iter::once(&self.headers)
                    .chain(&self.rows)
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn has_headers(&self) -> bool {
        self.headers.iter().any(|header| !header.is_empty())
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let widths = self.widths();
        writeln!(f, "{}", self.title)?;

        let write_row = |f: &mut Formatter<'_>, row: &[String]| -> std::fmt::Result {
            let cells = widths
                .iter()
                .enumerate()
                .map(|(column, width)| {
                    let cell = row.get(column).map(String::as_str).unwrap_or("");
                    if column == 0 {
                        format!("{cell:<width$}")
                    } else {
                        format!("{cell:>width$}")
                    }
                })
                .collect::<Vec<_>>();
            writeln!(f, "  {}", cells.join("  ").trim_end())
        };

        if self.has_headers() {
            write_row(f, &self.headers)?;
            let rule = widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "  {rule}")?;
        }
        for row in &self.rows {
            write_row(f, row)?;
        }
        Ok(())
    }
}

/// Large amounts with a T/B/M/K suffix, e.g. `3.42T`.
pub fn amount(value: f64) -> String {
    let magnitude = value.abs();
    let (scaled, suffix) = if magnitude >= 1e12 {
        (value / 1e12, "T")
    } else if magnitude >= 1e9 {
        (value / 1e9, "B")
    } else if magnitude >= 1e6 {
        (value / 1e6, "M")
    } else if magnitude >= 1e3 {
        (value / 1e3, "K")
    } else {
        (value, "")
    };
    format!("{scaled:.2}{suffix}")
}

pub fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

pub fn price(value: f64) -> String {
    format!("{value:.2}")
}

pub fn optional(value: Option<f64>, render: fn(f64) -> String) -> String {
    value.map_or_else(|| String::from("n/a"), render)
}
