//! Printf-style output rows.
//!
//! Supports exactly what the match projector needs: `%s` placeholders, `%%`
//! for a literal percent, and the backslash escapes `\n`, `\t`, `\\` so
//! templates survive shells that do not expand them.

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFormat {
    segments: Vec<Segment>,
    placeholders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value,
}

impl RowFormat {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut placeholders = 0;

        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '%' => match chars.next() {
                    Some('s') => {
                        if !literal.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal)));
                        }
                        segments.push(Segment::Value);
                        placeholders += 1;
                    }
                    Some('%') => literal.push('%'),
                    Some(other) => {
                        literal.push('%');
                        literal.push(other);
                    }
                    None => literal.push('%'),
                },
                '\\' => match chars.next() {
                    Some('n') => literal.push('\n'),
                    Some('t') => literal.push('\t'),
                    Some('\\') => literal.push('\\'),
                    Some(other) => {
                        literal.push('\\');
                        literal.push(other);
                    }
                    None => literal.push('\\'),
                },
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments, placeholders }
    }

    /// Number of `%s` placeholders.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Substitute values in order. Missing values render empty.
    pub fn render(&self, values: &[String]) -> String {
        let capacity: usize = values.iter().map(String::len).sum::<usize>() + 16;
        let mut out = String::with_capacity(capacity);
        let mut next = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value => {
                    if let Some(value) = values.get(next) {
                        out.push_str(value);
                    }
                    next += 1;
                }
            }
        }
        out
    }
}
