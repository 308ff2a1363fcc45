use std::collections::HashMap;

/// Pick the recommended phrase(s) out of one block.
///
/// Every whitespace token is counted across the whole block, each phrase is
/// scored by the mean frequency of its tokens, and the first phrase with the
/// strictly highest score wins. Returns at most one index; an empty block
/// returns an empty pick.
pub fn recommend(phrases: &[&str]) -> Vec<usize> {
    let mut unigrams: HashMap<&str, u32> = HashMap::new();
    for phrase in phrases {
        for word in phrase.split_whitespace() {
            *unigrams.entry(word).or_insert(0) += 1;
        }
    }

    let mut max_value = 0.0_f64;
    let mut result = Vec::new();
    for (i, phrase) in phrases.iter().enumerate() {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let value =
            words.iter().map(|w| f64::from(unigrams[w])).sum::<f64>() / words.len() as f64;
        if value > max_value {
            max_value = value;
            result = vec![i];
        }
    }
    result
}
