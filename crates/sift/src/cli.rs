//! Command-line surface of the sift binary.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sitesift", about = "Extract regex matches from grabbed site records")]
pub struct Cli {
    /// Files to process (glob pattern)
    #[arg(long, default_value = "*.lz4")]
    pub input: String,

    /// Regular expression to search for; repeat for several
    #[arg(long = "regexp", default_value = r"(?m)^\*URL: (.+)$")]
    pub regexp: Vec<String>,

    /// Output format, one %s per capture group
    #[arg(long, default_value = r"%s\n")]
    pub format: String,

    /// Output data to file (default: stdout)
    #[arg(long, default_value = "")]
    pub output: String,

    /// Number of regexes that must match before a row is emitted (-1 = all)
    #[arg(long = "requiredmatches", default_value_t = -1)]
    pub requiredmatches: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sitesift"]);
        assert_eq!(cli.input, "*.lz4");
        assert_eq!(cli.regexp, vec![r"(?m)^\*URL: (.+)$"]);
        assert_eq!(cli.format, r"%s\n");
        assert_eq!(cli.output, "");
        assert_eq!(cli.requiredmatches, -1);
    }

    #[test]
    fn test_repeatable_regexp() {
        let cli = Cli::parse_from([
            "sitesift",
            "--regexp",
            r"(?m)^\*Site: (.+)$",
            "--regexp",
            r"(?m)^\*Resultcode: (.+)$",
        ]);
        assert_eq!(cli.regexp.len(), 2);
    }
}
