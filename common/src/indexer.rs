use std::collections::BTreeSet;

use crate::shuffle::KeyValue;
use crate::wordcount::tokens;

/// map del índice invertido: (palabra, documento) una vez por palabra distinta.
pub fn map(split: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<String> = tokens(contents).collect();
    words
        .into_iter()
        .map(|w| KeyValue::new(w, split))
        .collect()
}

/// reduce del índice invertido: "<n_docs> <doc1>,<doc2>,..." con docs ordenados.
pub fn reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let joined = docs.iter().copied().collect::<Vec<_>>().join(",");
    format!("{} {}", docs.len(), joined)
}
