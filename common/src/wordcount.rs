use crate::shuffle::KeyValue;

/// Normaliza una palabra: solo alfanumérico y '_', en minúscula.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Tokens normalizados y no vacíos de un texto.
pub fn tokens(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
}

/// map de WordCount: emite (palabra, "1") por cada aparición.
pub fn map(_split: &str, contents: &str) -> Vec<KeyValue> {
    tokens(contents).map(|t| KeyValue::new(t, "1")).collect()
}

/// reduce de WordCount: cantidad de apariciones.
pub fn reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}
