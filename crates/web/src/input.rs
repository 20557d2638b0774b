//! CSV input parsing for batch submissions
//!
//! The expected shape is a header row followed by `old_url,new_url` rows.
//! Rows missing either side are dropped rather than failing the upload; the
//! core only ever sees complete pairs.

use vizdiff_core::UrlPair;

/// Parse URL pairs out of uploaded CSV content
pub fn parse_url_pairs(csv: &str) -> Vec<UrlPair> {
    csv.lines()
        .skip(1) // header row
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<UrlPair> {
    let mut fields = line.splitn(3, ',');
    let url_old = fields.next()?.trim();
    let url_new = fields.next()?.trim();

    if url_old.is_empty() || url_new.is_empty() {
        return None;
    }

    Some(UrlPair::new(url_old, url_new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_header() {
        let csv = "old,new\nhttp://a.test/1,http://a.test/2\nhttp://b.test/1,http://b.test/2\n";
        let pairs = parse_url_pairs(csv);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].url_old, "http://a.test/1");
        assert_eq!(pairs[1].url_new, "http://b.test/2");
    }

    #[test]
    fn drops_malformed_rows() {
        let csv = "old,new\nhttp://a.test/only-one\n,http://missing.old\nhttp://ok.test/a,http://ok.test/b\n\n";
        let pairs = parse_url_pairs(csv);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].url_old, "http://ok.test/a");
    }

    #[test]
    fn extra_columns_are_ignored() {
        let csv = "old,new,note\nhttp://a.test/x,http://a.test/y,redesign\n";
        let pairs = parse_url_pairs(csv);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].url_new, "http://a.test/y");
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_url_pairs("old,new\n").is_empty());
        assert!(parse_url_pairs("").is_empty());
    }
}
