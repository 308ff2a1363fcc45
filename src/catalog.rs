use scraper::{Html, Selector};
use tracing::warn;

/// One sub-dictionary as listed on the catalog page.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub link: String,
    pub word_count: i64,
}

/// One term row on a dictionary page.
#[derive(Debug, Clone)]
pub struct DictionaryRow {
    pub word: String,
    pub translation: String,
    pub author_name: String,
    pub author_link: String,
}

/// Everything the crawl needs from one dictionary page.
#[derive(Debug, Clone, Default)]
pub struct DictionaryPage {
    pub rows: Vec<DictionaryRow>,
    pub next_link: Option<String>,
}

/// Extract the sub-dictionary list from the catalog page. The first and
/// last linked rows are service rows (header and footer) and are dropped
/// positionally before anything is parsed.
pub fn parse_catalog(doc: &Html) -> Vec<CatalogEntry> {
    let row_sel = Selector::parse("tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    // (name, link, raw count) for every row whose first cell is linked
    let mut raw = Vec::new();
    for row in doc.select(&row_sel) {
        let mut tds = row.select(&td_sel);
        let Some(first) = tds.next() else { continue };
        let Some(anchor) = first.select(&a_sel).next() else {
            continue;
        };
        let name = anchor.text().collect::<String>().trim().to_string();
        let Some(link) = anchor.value().attr("href") else {
            warn!("Catalog row '{}' has no link, skipping", name);
            continue;
        };
        let count_text = tds
            .next()
            .map(|td| td.text().collect::<String>())
            .unwrap_or_default();
        raw.push((name, link.to_string(), count_text));
    }

    if raw.len() < 2 {
        return Vec::new();
    }

    raw[1..raw.len() - 1]
        .iter()
        .filter_map(|(name, link, count_text)| match count_text.trim().parse::<i64>() {
            Ok(word_count) => Some(CatalogEntry {
                name: name.clone(),
                link: link.clone(),
                word_count,
            }),
            Err(_) => {
                warn!("Catalog row '{}' has no word count, skipping", name);
                None
            }
        })
        .collect()
}

/// Extract term rows and the continuation link from one dictionary page.
/// Rows with an empty word cell are service rows and are skipped.
pub fn parse_dictionary_page(doc: &Html) -> DictionaryPage {
    let row_sel = Selector::parse("tr").unwrap();
    let term_sel = Selector::parse("td.termsforsubject").unwrap();
    let author_sel = Selector::parse("a > i").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let mut rows = Vec::new();
    for row in doc.select(&row_sel) {
        let tds: Vec<_> = row.select(&term_sel).collect();
        let word = tds
            .first()
            .map(|td| td.text().collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string();
        if word.is_empty() {
            continue;
        }
        let translation = tds
            .get(1)
            .map(|td| td.text().collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut author_name = String::new();
        let mut author_link = String::new();
        if let Some(td) = tds.get(2) {
            let name = td
                .select(&author_sel)
                .next()
                .map(|i| i.text().collect::<String>())
                .unwrap_or_default()
                .trim()
                .to_string();
            if !name.is_empty() {
                author_name = name;
                author_link = td
                    .select(&a_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default()
                    .to_string();
            }
        }

        rows.push(DictionaryRow {
            word,
            translation,
            author_name,
            author_link,
        });
    }

    DictionaryPage {
        rows,
        next_link: find_next_link(doc),
    }
}

/// The paging anchor is the one whose text carries ">>".
fn find_next_link(doc: &Html) -> Option<String> {
    let a_sel = Selector::parse("a").unwrap();
    doc.select(&a_sel)
        .find(|a| a.text().any(|t| t.contains(">>")))
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}
