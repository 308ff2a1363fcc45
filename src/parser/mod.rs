pub mod leaves;
pub mod phrase;
pub mod recommend;
pub mod segment;

use std::collections::HashSet;

use scraper::Html;

/// One output row for the translate table, recommendation already decided.
#[derive(Debug, Clone)]
pub struct TranslationRow {
    pub phrase: String,
    pub dictionary: String,
    pub block_number: u32,
    pub block_name: String,
    pub author_name: String,
    pub author_link: String,
    pub comment: String,
    pub recommended: bool,
}

/// Segment the page into blocks, pick each block's recommended candidate,
/// then flatten everything back to rows in page order.
pub fn parse_translation_page(
    html: &str,
    query: &str,
    excluded: &HashSet<String>,
) -> Vec<TranslationRow> {
    let doc = Html::parse_document(html);
    let mut rows = Vec::new();

    for unit in segment::segment_blocks(&doc, query, excluded) {
        let phrases: Vec<&str> = unit.candidates.iter().map(|c| c.phrase.as_str()).collect();
        let picks = recommend::recommend(&phrases);
        for (i, c) in unit.candidates.into_iter().enumerate() {
            rows.push(TranslationRow {
                phrase: c.phrase,
                dictionary: c.dictionary,
                block_number: c.block_number,
                block_name: c.block_name,
                author_name: c.author_name,
                author_link: c.author_link,
                comment: c.comment,
                recommended: picks.contains(&i),
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_exclusions() -> HashSet<String> {
        HashSet::new()
    }

    // Two blocks for "possibility": progr. carries two candidates sharing a
    // token, gen. carries one. With only recommended rows kept, one row per
    // block must survive.
    const PAGE: &str = r#"<html><body><table>
        <tr><td class="gray">possibility n | as noun</td></tr>
        <tr><td class="subj"><a href="/d">progr.</a></td>
            <td class="trans"><a href="/s1">capability</a>; <a href="/s2">opportunity</a></td></tr>
        <tr><td class="subj"><a href="/d">progr.</a></td>
            <td class="trans"><a href="/s3">capability</a></td></tr>
        <tr><td class="gray">possibilities n</td></tr>
        <tr><td class="subj"><a href="/d">gen.</a></td>
            <td class="trans"><a href="/s4">chance</a></td></tr>
    </table></body></html>"#;

    #[test]
    fn one_recommended_row_per_block() {
        let rows = parse_translation_page(PAGE, "possibility", &no_exclusions());
        let recommended: Vec<_> = rows.iter().filter(|r| r.recommended).collect();
        assert_eq!(recommended.len(), 2);
        assert_eq!(recommended[0].phrase, "capability");
        assert_eq!(recommended[0].block_number, 1);
        assert_eq!(recommended[1].phrase, "chance");
        assert_eq!(recommended[1].block_number, 2);
    }

    #[test]
    fn non_recommended_rows_marked() {
        let rows = parse_translation_page(PAGE, "possibility", &no_exclusions());
        assert_eq!(rows.len(), 4);
        let opportunity = rows.iter().find(|r| r.phrase == "opportunity").unwrap();
        assert!(!opportunity.recommended);
    }

    #[test]
    fn block_metadata_on_rows() {
        let rows = parse_translation_page(PAGE, "possibility", &no_exclusions());
        let chance = rows.iter().find(|r| r.phrase == "chance").unwrap();
        assert_eq!(chance.dictionary, "gen.");
        assert_eq!(chance.block_name, "possibilities n");
    }

    #[test]
    fn unparseable_page_yields_no_rows() {
        let rows = parse_translation_page("<html><body>oops</body></html>", "word", &no_exclusions());
        assert!(rows.is_empty());
    }
}
