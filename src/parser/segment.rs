use std::collections::HashSet;

use scraper::{Html, Selector};

use super::leaves::{leaf_nodes, LeafNode};
use super::phrase;

/// One admitted translation with the block and dictionary it belongs to.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub phrase: String,
    pub comment: String,
    pub author_name: String,
    pub author_link: String,
    pub dictionary: String,
    pub block_number: u32,
    pub block_name: String,
}

/// A contiguous run of translation rows between marker rows. Candidates of
/// one block are scored together.
#[derive(Debug, Clone)]
pub struct BlockUnit {
    pub number: u32,
    pub name: String,
    pub candidates: Vec<Candidate>,
}

/// Segment a translation page into blocks of admitted candidates.
///
/// Rows carrying a `gray` (marker) or `trans` (translation) cell are walked
/// in document order. A marker row closes the current block and opens the
/// next; a translation row reassembles its cell into phrases, which are
/// admitted when the dictionary label is not excluded and the phrase has
/// exactly as many words as the query. Rows before the first marker fall
/// into block 0 with an empty name.
pub fn segment_blocks(doc: &Html, query: &str, excluded: &HashSet<String>) -> Vec<BlockUnit> {
    let row_sel = Selector::parse("tr").unwrap();
    let typed_sel = Selector::parse("td.gray, td.trans").unwrap();
    let subj_sel = Selector::parse("td.subj a").unwrap();
    let gray_sel = Selector::parse("td.gray").unwrap();
    let trans_sel = Selector::parse("td.trans").unwrap();

    let query_len = query.split_whitespace().count();
    let mut blocks = Vec::new();
    let mut current = BlockUnit {
        number: 0,
        name: String::new(),
        candidates: Vec::new(),
    };

    for row in doc.select(&row_sel) {
        if row.select(&typed_sel).next().is_none() {
            continue;
        }

        let label = row.select(&subj_sel).next().map(|a| {
            let joined: String = a.text().collect();
            joined
        });

        match label.filter(|l| !l.is_empty()) {
            Some(raw) => {
                let dictionary = raw.trim().to_string();
                if excluded.contains(&dictionary) {
                    continue;
                }
                let nodes: Vec<LeafNode> = row.select(&trans_sel).flat_map(leaf_nodes).collect();
                for entry in phrase::reassemble(&nodes) {
                    if entry.phrase.split_whitespace().count() != query_len {
                        continue;
                    }
                    current.candidates.push(Candidate {
                        phrase: entry.phrase,
                        comment: entry.comment,
                        author_name: entry.author_name,
                        author_link: entry.author_link,
                        dictionary: dictionary.clone(),
                        block_number: current.number,
                        block_name: current.name.clone(),
                    });
                }
            }
            None => {
                if !current.candidates.is_empty() {
                    blocks.push(current.clone());
                }
                let raw: String = row.select(&gray_sel).flat_map(|td| td.text()).collect();
                let name = match raw.find('|') {
                    Some(idx) => &raw[..idx],
                    None => raw.as_str(),
                };
                current = BlockUnit {
                    number: current.number + 1,
                    name: name.trim().to_string(),
                    candidates: Vec::new(),
                };
            }
        }
    }

    if !current.candidates.is_empty() {
        blocks.push(current);
    }
    blocks
}
